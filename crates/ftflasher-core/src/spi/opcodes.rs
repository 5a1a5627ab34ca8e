//! Standard JEDEC SPI flash opcodes
//!
//! Only the single-I/O subset that the FTDI bridges can drive is listed here.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;

// ============================================================================
// Read commands
// ============================================================================

/// Read Data with 3-byte address
pub const READ: u8 = 0x03;
/// Read Data with 4-byte address
pub const READ_4B: u8 = 0x13;

// ============================================================================
// Program commands
// ============================================================================

/// Page Program with 3-byte address
pub const PP: u8 = 0x02;
/// Page Program with 4-byte address
pub const PP_4B: u8 = 0x12;

// ============================================================================
// Erase commands - 3-byte address
// ============================================================================

/// Sector Erase (4 KiB)
pub const SE_20: u8 = 0x20;
/// Block Erase (32 KiB)
pub const BE_52: u8 = 0x52;
/// Block Erase (64 KiB)
pub const BE_D8: u8 = 0xD8;
/// Chip Erase (alternative opcode)
pub const CE_60: u8 = 0x60;
/// Chip Erase
pub const CE_C7: u8 = 0xC7;

// ============================================================================
// Erase commands - 4-byte address
// ============================================================================

/// Sector Erase (4 KiB) with 4-byte address
pub const SE_21: u8 = 0x21;
/// Block Erase (32 KiB) with 4-byte address
pub const BE_5C: u8 = 0x5C;
/// Block Erase (64 KiB) with 4-byte address
pub const BE_DC: u8 = 0xDC;

// ============================================================================
// 4-byte address mode
// ============================================================================

/// Enter 4-byte address mode
pub const EN4B: u8 = 0xB7;
/// Exit 4-byte address mode
pub const EX4B: u8 = 0xE9;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;

/// Check whether an opcode is a chip erase command (no address phase)
pub fn is_chip_erase(opcode: u8) -> bool {
    opcode == CE_60 || opcode == CE_C7
}
