//! Flash chip type definitions

use std::fmt;

use super::features::Features;

/// Raw 3-byte JEDEC ID as returned by RDID (0x9F)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JedecId(pub [u8; 3]);

impl JedecId {
    /// JEDEC manufacturer ID (first byte)
    pub fn manufacturer(&self) -> u8 {
        self.0[0]
    }

    /// JEDEC device ID (second and third bytes)
    pub fn device(&self) -> u16 {
        u16::from_be_bytes([self.0[1], self.0[2]])
    }

    /// The ID as a 24-bit value (manufacturer << 16 | device)
    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes([0, self.0[0], self.0[1], self.0[2]])
    }

    /// A floating MISO line reads back as all ones; treat it like no answer
    pub fn normalized(self) -> Self {
        if self.0 == [0xFF; 3] {
            JedecId([0; 3])
        } else {
            self
        }
    }

    /// True when no chip answered (all bytes zero)
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl From<u32> for JedecId {
    fn from(value: u32) -> Self {
        let b = value.to_be_bytes();
        JedecId([b[1], b[2], b[3]])
    }
}

impl fmt::Display for JedecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X} {:02X}", self.0[0], self.0[1], self.0[2])
    }
}

/// Erase block definition
///
/// An erase operation supported by a flash chip: the opcode and the size
/// of the region it clears. A block as large as the chip is a chip erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseBlock {
    /// SPI opcode for this erase operation
    pub opcode: u8,
    /// Size of the erased region in bytes
    pub size: u32,
}

impl EraseBlock {
    /// Create a new erase block
    pub const fn new(opcode: u8, size: u32) -> Self {
        Self { opcode, size }
    }
}

/// Write granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteGranularity {
    /// Can write individual bits (1->0 only)
    Bit,
    /// Can write individual bytes
    Byte,
    /// Must write full pages
    #[default]
    Page,
}

/// Flash chip definition
///
/// This structure contains all the information needed to identify and
/// interact with a specific flash chip model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashChip {
    /// Vendor name (e.g., "Winbond")
    pub vendor: String,
    /// Chip model name (e.g., "W25Q128.V")
    pub name: String,
    /// JEDEC manufacturer ID (first byte of RDID response)
    pub jedec_manufacturer: u8,
    /// JEDEC device ID (second and third bytes of RDID response)
    pub jedec_device: u16,
    /// Total flash size in bytes
    pub total_size: u32,
    /// Page size in bytes (for programming)
    pub page_size: u16,
    /// Feature flags
    pub features: Features,
    /// Write granularity
    pub write_granularity: WriteGranularity,
    /// Available erase block sizes (smallest to largest)
    pub erase_blocks: Vec<EraseBlock>,
}

impl FlashChip {
    /// Get the JEDEC ID of this chip
    pub fn jedec_id(&self) -> JedecId {
        JedecId::from(((self.jedec_manufacturer as u32) << 16) | (self.jedec_device as u32))
    }

    /// Check if this chip matches the given JEDEC ID
    pub fn matches_jedec_id(&self, manufacturer: u8, device: u16) -> bool {
        self.jedec_manufacturer == manufacturer && self.jedec_device == device
    }

    /// Check if this chip requires 4-byte addressing
    pub fn requires_4byte_addr(&self) -> bool {
        self.total_size > 16 * 1024 * 1024
    }

    /// Get the smallest erase block size
    pub fn min_erase_size(&self) -> Option<u32> {
        self.sector_erase_blocks().map(|eb| eb.size).min()
    }

    /// Erase blocks smaller than the whole chip, smallest first
    pub fn sector_erase_blocks(&self) -> impl Iterator<Item = &EraseBlock> {
        self.erase_blocks
            .iter()
            .filter(move |eb| eb.size < self.total_size)
    }

    /// The chip erase block, if the chip declares one
    pub fn chip_erase_block(&self) -> Option<&EraseBlock> {
        self.erase_blocks
            .iter()
            .find(|eb| eb.size == self.total_size)
    }
}

impl fmt::Display for FlashChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.vendor,
            self.name,
            format_size(self.total_size)
        )
    }
}

/// Format a byte count with the largest whole binary unit
pub fn format_size(size: u32) -> String {
    if size >= 1024 * 1024 && size % (1024 * 1024) == 0 {
        format!("{} MiB", size / (1024 * 1024))
    } else if size >= 1024 && size % 1024 == 0 {
        format!("{} KiB", size / 1024)
    } else {
        format!("{} bytes", size)
    }
}

/// JEDEC manufacturer IDs
pub mod manufacturer {
    /// Atmel
    pub const ATMEL: u8 = 0x1F;
    /// EON
    pub const EON: u8 = 0x1C;
    /// GigaDevice
    pub const GIGADEVICE: u8 = 0xC8;
    /// ISSI
    pub const ISSI: u8 = 0x9D;
    /// Macronix
    pub const MACRONIX: u8 = 0xC2;
    /// Micron
    pub const MICRON: u8 = 0x20;
    /// Spansion
    pub const SPANSION: u8 = 0x01;
    /// Winbond
    pub const WINBOND: u8 = 0xEF;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jedec_id_formatting() {
        let id = JedecId([0xEF, 0x40, 0x18]);
        assert_eq!(id.to_string(), "EF 40 18");
        assert_eq!(id.manufacturer(), manufacturer::WINBOND);
        assert_eq!(id.device(), 0x4018);
        assert_eq!(id.as_u32(), 0xEF4018);
        assert_eq!(JedecId::from(0xEF4018), id);
    }

    #[test]
    fn test_jedec_id_normalization() {
        assert!(JedecId([0xFF; 3]).normalized().is_blank());
        assert!(JedecId([0; 3]).normalized().is_blank());
        assert!(!JedecId([0xFF, 0xFF, 0x00]).normalized().is_blank());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(16 * 1024 * 1024), "16 MiB");
        assert_eq!(format_size(512 * 1024), "512 KiB");
        assert_eq!(format_size(100), "100 bytes");
    }
}
