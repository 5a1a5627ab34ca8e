//! ftflasher-dummy - In-memory flash emulator for testing
//!
//! This crate provides a dummy SPI master that emulates a serial NOR flash
//! chip in memory. It backs the `dummy://` device URL and the tests of the
//! range operations and the flash runner.
//!
//! The emulator is strict where real chips are: programming only clears
//! bits, program/erase require the write enable latch, and addressed
//! commands must use the address width matching the current 3/4-byte mode.

use std::sync::{Arc, Mutex, MutexGuard};

use ftflasher_core::error::{Error, Result};
use ftflasher_core::programmer::{SpiFeatures, SpiMaster};
use ftflasher_core::spi::{opcodes, AddressWidth, SpiCommand};

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Raw bytes answered to RDID
    pub jedec_id: [u8; 3],
    /// Flash size in bytes
    pub size: usize,
    /// Page size for programming
    pub page_size: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            jedec_id: [0xEF, 0x40, 0x18], // Winbond W25Q128.V
            size: 16 * 1024 * 1024,
            page_size: 256,
        }
    }
}

impl DummyConfig {
    /// Set the JEDEC ID answered by the emulated chip
    pub fn jedec_id(mut self, id: [u8; 3]) -> Self {
        self.jedec_id = id;
        self
    }

    /// Set the emulated flash size
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }
}

/// Dummy flash programmer
///
/// Emulates a flash chip in memory for testing purposes.
#[derive(Debug)]
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    write_enabled: bool,
    in_4byte_mode: bool,
    opcode_log: Vec<u8>,
}

impl DummyFlash {
    /// Create a new dummy flash with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            write_enabled: false,
            in_4byte_mode: false,
            opcode_log: Vec::new(),
        }
    }

    /// Create a new dummy flash with default configuration (W25Q128.V)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Every opcode executed so far, in order
    pub fn opcode_log(&self) -> &[u8] {
        &self.opcode_log
    }

    /// Number of times `opcode` was executed
    pub fn count(&self, opcode: u8) -> usize {
        self.opcode_log.iter().filter(|&&op| op == opcode).count()
    }

    /// Whether the chip is currently in 4-byte address mode
    pub fn in_4byte_mode(&self) -> bool {
        self.in_4byte_mode
    }

    /// Wrap the flash so it can be handed out as a link while the caller
    /// keeps access to its contents
    pub fn into_shared(self) -> SharedDummyFlash {
        SharedDummyFlash(Arc::new(Mutex::new(self)))
    }

    /// Check the address phase of a command and return its address
    fn checked_address(&self, cmd: &SpiCommand<'_>, native_4byte: bool) -> Result<usize> {
        let expected = if native_4byte || self.in_4byte_mode {
            AddressWidth::FourByte
        } else {
            AddressWidth::ThreeByte
        };
        match cmd.address {
            Some(addr) if cmd.address_width == expected => Ok(addr as usize),
            _ => Err(Error::Transport(format!(
                "opcode 0x{:02X} sent with {:?} address, chip expects {:?}",
                cmd.opcode, cmd.address_width, expected
            ))),
        }
    }

    fn handle_read(&mut self, cmd: &mut SpiCommand<'_>, native_4byte: bool) -> Result<()> {
        let addr = self.checked_address(cmd, native_4byte)?;
        let len = cmd.read_buf.len();

        if addr + len > self.data.len() {
            return Err(Error::AddressOutOfBounds);
        }

        cmd.read_buf.copy_from_slice(&self.data[addr..addr + len]);
        Ok(())
    }

    fn handle_page_program(&mut self, cmd: &SpiCommand<'_>, native_4byte: bool) -> Result<()> {
        if !self.write_enabled {
            return Err(Error::WriteProtected);
        }

        let addr = self.checked_address(cmd, native_4byte)?;
        let data = cmd.write_data;

        // Data past the end of the page wraps around, which is never intended
        let page_offset = addr % self.config.page_size;
        if page_offset + data.len() > self.config.page_size {
            return Err(Error::Transport(format!(
                "page program of {} bytes at 0x{:08X} crosses a page boundary",
                data.len(),
                addr
            )));
        }
        if addr + data.len() > self.data.len() {
            return Err(Error::AddressOutOfBounds);
        }

        // Flash programming: can only change 1 -> 0
        for (i, &byte) in data.iter().enumerate() {
            self.data[addr + i] &= byte;
        }

        self.write_enabled = false;
        Ok(())
    }

    fn handle_sector_erase(
        &mut self,
        cmd: &SpiCommand<'_>,
        erase_size: usize,
        native_4byte: bool,
    ) -> Result<()> {
        if !self.write_enabled {
            return Err(Error::WriteProtected);
        }

        let addr = self.checked_address(cmd, native_4byte)?;

        // Align address to erase boundary
        let aligned_addr = addr & !(erase_size - 1);

        if aligned_addr + erase_size > self.data.len() {
            return Err(Error::AddressOutOfBounds);
        }

        self.data[aligned_addr..aligned_addr + erase_size].fill(0xFF);

        self.write_enabled = false;
        Ok(())
    }

    fn handle_chip_erase(&mut self) -> Result<()> {
        if !self.write_enabled {
            return Err(Error::WriteProtected);
        }

        self.data.fill(0xFF);

        self.write_enabled = false;
        Ok(())
    }
}

impl SpiMaster for DummyFlash {
    fn features(&self) -> SpiFeatures {
        SpiFeatures::FOUR_BYTE_ADDR
    }

    fn max_read_len(&self) -> usize {
        4096
    }

    fn max_write_len(&self) -> usize {
        self.config.page_size
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        self.opcode_log.push(cmd.opcode);

        match cmd.opcode {
            // JEDEC ID
            opcodes::RDID => {
                let n = cmd.read_buf.len().min(3);
                cmd.read_buf[..n].copy_from_slice(&self.config.jedec_id[..n]);
                Ok(())
            }

            // Status register read; operations complete instantly so WIP
            // is never set
            opcodes::RDSR => {
                if let Some(status) = cmd.read_buf.first_mut() {
                    *status = if self.write_enabled {
                        opcodes::SR1_WEL
                    } else {
                        0
                    };
                }
                Ok(())
            }

            // Write enable/disable
            opcodes::WREN => {
                self.write_enabled = true;
                Ok(())
            }
            opcodes::WRDI => {
                self.write_enabled = false;
                Ok(())
            }

            // Read commands
            opcodes::READ => self.handle_read(cmd, false),
            opcodes::READ_4B => self.handle_read(cmd, true),

            // Page program
            opcodes::PP => self.handle_page_program(cmd, false),
            opcodes::PP_4B => self.handle_page_program(cmd, true),

            // Erase commands
            opcodes::SE_20 => self.handle_sector_erase(cmd, 4 * 1024, false),
            opcodes::SE_21 => self.handle_sector_erase(cmd, 4 * 1024, true),
            opcodes::BE_52 => self.handle_sector_erase(cmd, 32 * 1024, false),
            opcodes::BE_5C => self.handle_sector_erase(cmd, 32 * 1024, true),
            opcodes::BE_D8 => self.handle_sector_erase(cmd, 64 * 1024, false),
            opcodes::BE_DC => self.handle_sector_erase(cmd, 64 * 1024, true),
            opcodes::CE_60 | opcodes::CE_C7 => self.handle_chip_erase(),

            // 4-byte address mode
            opcodes::EN4B => {
                self.in_4byte_mode = true;
                Ok(())
            }
            opcodes::EX4B => {
                self.in_4byte_mode = false;
                Ok(())
            }

            // Unknown opcode
            _ => Err(Error::OpcodeNotSupported),
        }
    }

    fn delay_us(&mut self, _us: u32) {
        // No delay needed for in-memory operations
    }
}

/// A [`DummyFlash`] behind a shared handle
///
/// Cloning yields another handle to the same emulated chip.
#[derive(Debug, Clone)]
pub struct SharedDummyFlash(Arc<Mutex<DummyFlash>>);

impl SharedDummyFlash {
    /// Lock the emulated chip for inspection
    pub fn lock(&self) -> MutexGuard<'_, DummyFlash> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SpiMaster for SharedDummyFlash {
    fn features(&self) -> SpiFeatures {
        self.lock().features()
    }

    fn max_read_len(&self) -> usize {
        self.lock().max_read_len()
    }

    fn max_write_len(&self) -> usize {
        self.lock().max_write_len()
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        self.lock().execute(cmd)
    }

    fn delay_us(&mut self, us: u32) {
        self.lock().delay_us(us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftflasher_core::chip::{ChipDatabase, EraseBlock, Features, FlashChip, WriteGranularity};
    use ftflasher_core::flash::{self, FlashContext, NoProgress, OperationProgress, Phase};
    use ftflasher_core::protocol;

    fn w25q128() -> FlashContext {
        let db = ChipDatabase::builtin().unwrap();
        FlashContext::new(db.find_by_jedec_id(0xEF, 0x4018).unwrap().clone())
    }

    fn big_chip(features: Features) -> FlashContext {
        FlashContext::new(FlashChip {
            vendor: "Test".into(),
            name: "BIG".into(),
            jedec_manufacturer: 0xEF,
            jedec_device: 0x4019,
            total_size: 32 << 20,
            page_size: 256,
            features,
            write_granularity: WriteGranularity::Page,
            erase_blocks: vec![
                EraseBlock::new(opcodes::SE_20, 4096),
                EraseBlock::new(opcodes::BE_D8, 65536),
            ],
        })
    }

    /// Test data without erased (0xFF) bytes
    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_read_jedec_id() {
        let mut flash = DummyFlash::new_default();
        let id = protocol::read_jedec_id(&mut flash).unwrap();
        assert_eq!(id.manufacturer(), 0xEF);
        assert_eq!(id.device(), 0x4018);
    }

    #[test]
    fn test_read_write() {
        let mut flash = DummyFlash::new_default();

        let data = [0x12, 0x34, 0x56, 0x78];
        protocol::write_enable(&mut flash).unwrap();
        let mut cmd = SpiCommand::write(opcodes::PP, AddressWidth::ThreeByte, 0x1000, &data);
        flash.execute(&mut cmd).unwrap();

        let mut buf = [0u8; 4];
        let mut cmd = SpiCommand::read(opcodes::READ, AddressWidth::ThreeByte, 0x1000, &mut buf);
        flash.execute(&mut cmd).unwrap();

        assert_eq!(buf, data);
    }

    #[test]
    fn test_program_without_wren_is_rejected() {
        let mut flash = DummyFlash::new_default();
        let mut cmd = SpiCommand::write(opcodes::PP, AddressWidth::ThreeByte, 0, &[0]);
        assert_eq!(flash.execute(&mut cmd), Err(Error::WriteProtected));
    }

    #[test]
    fn test_address_width_must_match_mode() {
        let mut flash = DummyFlash::new_default();
        let mut buf = [0u8; 1];
        let mut cmd = SpiCommand::read(opcodes::READ, AddressWidth::FourByte, 0, &mut buf);
        assert!(matches!(flash.execute(&mut cmd), Err(Error::Transport(_))));

        protocol::enter_4byte_mode(&mut flash).unwrap();
        let mut cmd = SpiCommand::read(opcodes::READ, AddressWidth::FourByte, 0, &mut buf);
        flash.execute(&mut cmd).unwrap();
    }

    #[test]
    fn test_read_range_returns_contents() {
        let contents = pattern(64 * 1024);
        let mut flash = DummyFlash::with_data(DummyConfig::default(), &contents);
        let ctx = w25q128();

        let mut buf = vec![0u8; 10_000];
        flash::read_range(&mut flash, &ctx, 0x1234, &mut buf, &mut NoProgress).unwrap();
        assert_eq!(buf, contents[0x1234..0x1234 + 10_000]);
    }

    #[test]
    fn test_read_range_out_of_bounds() {
        let mut flash = DummyFlash::new_default();
        let ctx = w25q128();
        let mut buf = vec![0u8; 16];
        let err = flash::read_range(&mut flash, &ctx, (16 << 20) - 8, &mut buf, &mut NoProgress)
            .unwrap_err();
        assert_eq!(err, Error::AddressOutOfBounds);
    }

    #[test]
    fn test_write_range_preserves_neighbours() {
        let contents = pattern(3 * 4096);
        let mut flash = DummyFlash::with_data(DummyConfig::default(), &contents);
        let ctx = w25q128();

        let data = vec![0x5A; 5000];
        let stats = flash::write_range(&mut flash, &ctx, 1000, &data, &mut NoProgress).unwrap();
        assert_eq!(stats.sectors_erased, 2);

        let mut expected = contents.clone();
        expected[1000..6000].copy_from_slice(&data);
        assert_eq!(&flash.data()[..3 * 4096], &expected[..]);

        flash::verify_range(&mut flash, &ctx, 1000, &data, &mut NoProgress).unwrap();
    }

    #[test]
    fn test_write_range_skips_identical_sectors() {
        let contents = pattern(2 * 4096);
        let mut flash = DummyFlash::with_data(DummyConfig::default(), &contents);
        let ctx = w25q128();

        let stats =
            flash::write_range(&mut flash, &ctx, 0, &contents, &mut NoProgress).unwrap();
        assert_eq!(stats.sectors_skipped, 2);
        assert_eq!(stats.bytes_programmed, 0);
        assert_eq!(flash.count(opcodes::PP), 0);
        assert_eq!(flash.count(opcodes::SE_20), 0);
    }

    #[test]
    fn test_write_range_into_erased_sector_does_not_erase() {
        let mut flash = DummyFlash::new_default();
        let ctx = w25q128();

        let data = pattern(600);
        let stats = flash::write_range(&mut flash, &ctx, 0x2080, &data, &mut NoProgress).unwrap();
        assert_eq!(stats.sectors_erased, 0);
        assert_eq!(stats.bytes_programmed, 600);
        assert_eq!(flash.count(opcodes::SE_20), 0);
        // Unaligned start spans three pages
        assert_eq!(flash.count(opcodes::PP), 3);
        assert_eq!(&flash.data()[0x2080..0x2080 + 600], &data[..]);
    }

    #[test]
    fn test_verify_reports_first_mismatch() {
        let mut flash = DummyFlash::new_default();
        let ctx = w25q128();
        flash.data_mut()[0x105] = 0x00;
        let err = flash::verify_range(&mut flash, &ctx, 0x100, &[0xFF; 16], &mut NoProgress)
            .unwrap_err();
        assert_eq!(err, Error::VerifyError { addr: 0x105 });
    }

    #[test]
    fn test_erase_uses_largest_aligned_blocks() {
        let mut flash = DummyFlash::with_data(DummyConfig::default(), &[0u8; 0x30000]);
        let ctx = w25q128();

        // 0xF000..0x21000: 4K up to 0x10000, 64K, then 4K
        let stats =
            flash::erase_range(&mut flash, &ctx, 0xF000, 0x12000, &mut NoProgress).unwrap();
        assert_eq!(stats.blocks_erased, 3);
        assert_eq!(flash.count(opcodes::SE_20), 2);
        assert_eq!(flash.count(opcodes::BE_D8), 1);
        assert!(flash.data()[0xF000..0x21000].iter().all(|&b| b == 0xFF));
        assert_eq!(flash.data()[0xEFFF], 0);
        assert_eq!(flash.data()[0x21000], 0);
    }

    #[test]
    fn test_erase_rejects_unaligned_range() {
        let mut flash = DummyFlash::new_default();
        let ctx = w25q128();
        let err = flash::erase_range(&mut flash, &ctx, 0x100, 4096, &mut NoProgress).unwrap_err();
        assert_eq!(err, Error::InvalidAlignment(4096));
        let err = flash::erase_range(&mut flash, &ctx, 0, 100, &mut NoProgress).unwrap_err();
        assert_eq!(err, Error::InvalidAlignment(4096));
        assert!(flash.opcode_log().is_empty());
    }

    #[test]
    fn test_whole_chip_erase_uses_chip_erase() {
        let mut flash = DummyFlash::with_data(DummyConfig::default(), &[0u8; 4096]);
        let ctx = w25q128();
        let stats =
            flash::erase_range(&mut flash, &ctx, 0, 16 << 20, &mut NoProgress).unwrap();
        assert!(stats.chip_erase);
        assert_eq!(flash.count(opcodes::CE_C7), 1);
        assert!(flash.data().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_native_4byte_chip_uses_4byte_opcodes() {
        let config = DummyConfig::default().size(32 << 20);
        let mut flash = DummyFlash::new(config);
        let ctx = big_chip(Features::FOUR_BYTE_NATIVE);

        let data = pattern(300);
        flash::write_range(&mut flash, &ctx, 0x0100_0000, &data, &mut NoProgress).unwrap();
        assert_eq!(&flash.data()[0x0100_0000..0x0100_0000 + 300], &data[..]);
        assert_eq!(flash.count(opcodes::PP_4B), 2);
        assert_eq!(flash.count(opcodes::EN4B), 0);
    }

    #[test]
    fn test_mode_switch_chip_brackets_transfers() {
        let config = DummyConfig::default().size(32 << 20);
        let mut flash = DummyFlash::new(config);
        flash.data_mut()[0x0100_0010] = 0x42;
        let ctx = big_chip(Features::FOUR_BYTE_ENTER);

        let mut buf = [0u8; 32];
        flash::read_range(&mut flash, &ctx, 0x0100_0000, &mut buf, &mut NoProgress).unwrap();
        assert_eq!(buf[0x10], 0x42);
        assert_eq!(flash.count(opcodes::EN4B), 1);
        assert_eq!(flash.count(opcodes::EX4B), 1);
        assert!(!flash.in_4byte_mode());
    }

    struct AbortAfter {
        calls: std::cell::Cell<usize>,
        limit: usize,
        phases: Vec<Phase>,
    }

    impl OperationProgress for AbortAfter {
        fn start(&mut self, phase: Phase, _total: u64) {
            self.phases.push(phase);
        }

        fn advance(&mut self, _done: u64) {}

        fn should_abort(&self) -> bool {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            n > self.limit
        }
    }

    #[test]
    fn test_abort_stops_before_next_erase() {
        let mut flash = DummyFlash::with_data(DummyConfig::default(), &[0u8; 4 * 4096]);
        let ctx = w25q128();
        let mut progress = AbortAfter {
            calls: std::cell::Cell::new(0),
            limit: 2,
            phases: Vec::new(),
        };

        let err =
            flash::erase_range(&mut flash, &ctx, 0, 4 * 4096, &mut progress).unwrap_err();
        assert_eq!(err, Error::Aborted);
        assert_eq!(flash.count(opcodes::SE_20), 2);
        assert_eq!(progress.phases, vec![Phase::Erasing]);
        assert!(flash.data()[2 * 4096..4 * 4096].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_shared_handle_sees_writes() {
        let shared = DummyFlash::new_default().into_shared();
        let mut link: Box<dyn SpiMaster + Send> = Box::new(shared.clone());
        let ctx = w25q128();

        flash::write_range(&mut link, &ctx, 0, &[1, 2, 3], &mut NoProgress).unwrap();
        drop(link);
        assert_eq!(&shared.lock().data()[..3], &[1, 2, 3]);
    }
}
