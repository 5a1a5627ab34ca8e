//! Flash context - runtime state for flash operations

use crate::chip::{Features, FlashChip};
use crate::error::Result;
use crate::error::Error;
use crate::programmer::{SpiFeatures, SpiMaster};
use crate::protocol;
use crate::spi::{opcodes, AddressWidth};

/// Address mode currently in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    /// 3-byte addressing (up to 16 MiB)
    #[default]
    ThreeByte,
    /// 4-byte addressing (up to 4 GiB)
    FourByte,
}

/// Runtime context for flash operations
///
/// This structure holds the state needed to interact with a specific
/// flash chip through a programmer.
#[derive(Debug, Clone)]
pub struct FlashContext {
    /// The identified flash chip
    pub chip: FlashChip,
    /// Current address mode
    pub address_mode: AddressMode,
    /// Whether to use native 4-byte commands or mode switching
    pub use_native_4byte: bool,
}

impl FlashContext {
    /// Create a new flash context for the given chip
    pub fn new(chip: FlashChip) -> Self {
        let address_mode = if chip.requires_4byte_addr() {
            AddressMode::FourByte
        } else {
            AddressMode::ThreeByte
        };

        let use_native_4byte = chip.features.contains(Features::FOUR_BYTE_NATIVE);

        Self {
            chip,
            address_mode,
            use_native_4byte,
        }
    }

    /// Check that `master` can address the whole chip
    ///
    /// Chips above 16 MiB need 4-byte addresses on the wire.
    pub fn check_master<M: SpiMaster + ?Sized>(&self, master: &M) -> Result<()> {
        if self.address_mode == AddressMode::FourByte
            && !master.features().contains(SpiFeatures::FOUR_BYTE_ADDR)
        {
            log::error!(
                "{} needs 4-byte addressing, which the programmer does not support",
                self.chip
            );
            return Err(Error::OpcodeNotSupported);
        }
        Ok(())
    }

    /// Get the page size for this chip
    pub fn page_size(&self) -> usize {
        self.chip.page_size as usize
    }

    /// Get the total size of this chip
    pub fn total_size(&self) -> usize {
        self.chip.total_size as usize
    }

    /// Check if an address range is valid for this chip
    pub fn is_valid_range(&self, addr: u32, len: usize) -> bool {
        let end = addr as u64 + len as u64;
        end <= self.chip.total_size as u64
    }

    /// Address width used on the wire
    pub fn address_width(&self) -> AddressWidth {
        match self.address_mode {
            AddressMode::ThreeByte => AddressWidth::ThreeByte,
            AddressMode::FourByte => AddressWidth::FourByte,
        }
    }

    /// Whether EN4B/EX4B must bracket addressed commands
    pub fn needs_mode_switch(&self) -> bool {
        self.address_mode == AddressMode::FourByte && !self.use_native_4byte
    }

    /// Opcode for reading data
    pub fn read_opcode(&self) -> u8 {
        if self.address_mode == AddressMode::FourByte && self.use_native_4byte {
            opcodes::READ_4B
        } else {
            opcodes::READ
        }
    }

    /// Opcode for page programming
    pub fn program_opcode(&self) -> u8 {
        if self.address_mode == AddressMode::FourByte && self.use_native_4byte {
            opcodes::PP_4B
        } else {
            opcodes::PP
        }
    }

    /// Opcode for an erase block, mapped to its 4-byte form if needed
    pub fn erase_opcode(&self, opcode: u8) -> u8 {
        if self.address_mode == AddressMode::FourByte && self.use_native_4byte {
            map_to_4byte_erase_opcode(opcode)
        } else {
            opcode
        }
    }

    /// Run `f` with the chip switched into the address mode this context
    /// expects, leaving 4-byte mode again afterwards even if `f` failed
    pub fn with_address_mode<M, T, F>(&self, master: &mut M, f: F) -> Result<T>
    where
        M: SpiMaster + ?Sized,
        F: FnOnce(&mut M) -> Result<T>,
    {
        if !self.needs_mode_switch() {
            return f(master);
        }

        protocol::enter_4byte_mode(master)?;
        let result = f(master);
        let exit = protocol::exit_4byte_mode(master);
        match (result, exit) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), _) => Err(e),
        }
    }
}

/// Map a 3-byte erase opcode to its 4-byte equivalent
fn map_to_4byte_erase_opcode(opcode: u8) -> u8 {
    match opcode {
        opcodes::SE_20 => opcodes::SE_21,
        opcodes::BE_52 => opcodes::BE_5C,
        opcodes::BE_D8 => opcodes::BE_DC,
        _ => opcode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::{EraseBlock, WriteGranularity};

    fn chip(size_mib: u32, features: Features) -> FlashChip {
        FlashChip {
            vendor: "Test".into(),
            name: "T".into(),
            jedec_manufacturer: 0xEF,
            jedec_device: 0x4019,
            total_size: size_mib << 20,
            page_size: 256,
            features,
            write_granularity: WriteGranularity::Page,
            erase_blocks: vec![EraseBlock::new(opcodes::SE_20, 4096)],
        }
    }

    #[test]
    fn test_small_chip_uses_3byte() {
        let ctx = FlashContext::new(chip(16, Features::empty()));
        assert_eq!(ctx.address_width(), AddressWidth::ThreeByte);
        assert!(!ctx.needs_mode_switch());
        assert_eq!(ctx.read_opcode(), opcodes::READ);
        assert!(ctx.is_valid_range(0, 16 << 20));
        assert!(!ctx.is_valid_range(1, 16 << 20));
    }

    #[test]
    fn test_native_4byte_opcodes() {
        let ctx = FlashContext::new(chip(32, Features::FOUR_BYTE_NATIVE));
        assert_eq!(ctx.address_width(), AddressWidth::FourByte);
        assert!(!ctx.needs_mode_switch());
        assert_eq!(ctx.read_opcode(), opcodes::READ_4B);
        assert_eq!(ctx.program_opcode(), opcodes::PP_4B);
        assert_eq!(ctx.erase_opcode(opcodes::SE_20), opcodes::SE_21);
        assert_eq!(ctx.erase_opcode(opcodes::CE_C7), opcodes::CE_C7);
    }

    #[test]
    fn test_mode_switch_keeps_3byte_opcodes() {
        let ctx = FlashContext::new(chip(32, Features::FOUR_BYTE_ENTER));
        assert!(ctx.needs_mode_switch());
        assert_eq!(ctx.address_width(), AddressWidth::FourByte);
        assert_eq!(ctx.read_opcode(), opcodes::READ);
        assert_eq!(ctx.erase_opcode(opcodes::SE_20), opcodes::SE_20);
    }

    struct Master(SpiFeatures);

    impl SpiMaster for Master {
        fn features(&self) -> SpiFeatures {
            self.0
        }
        fn max_read_len(&self) -> usize {
            256
        }
        fn max_write_len(&self) -> usize {
            256
        }
        fn execute(&mut self, _cmd: &mut crate::spi::SpiCommand<'_>) -> Result<()> {
            Ok(())
        }
        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn test_large_chip_needs_4byte_master() {
        let large = FlashContext::new(chip(32, Features::FOUR_BYTE_NATIVE));
        assert_eq!(
            large.check_master(&Master(SpiFeatures::empty())),
            Err(Error::OpcodeNotSupported)
        );
        assert!(large.check_master(&Master(SpiFeatures::FOUR_BYTE_ADDR)).is_ok());

        let small = FlashContext::new(chip(16, Features::empty()));
        assert!(small.check_master(&Master(SpiFeatures::empty())).is_ok());
    }
}
