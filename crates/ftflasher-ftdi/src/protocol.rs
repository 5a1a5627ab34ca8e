//! FTDI MPSSE protocol constants and device types
//!
//! Based on the FTDI MPSSE documentation (AN_108) and the FT2232H/FT232H
//! datasheets.

// ============================================================================
// USB VID/PID constants
// ============================================================================

/// FTDI vendor ID
pub const FTDI_VID: u16 = 0x0403;

/// FT232R/FT245R product ID (single channel, bit-bang only)
pub const FTDI_FT232R_PID: u16 = 0x6001;

/// FT2232C/D/H product ID (dual channel)
pub const FTDI_FT2232H_PID: u16 = 0x6010;

/// FT4232H product ID (quad channel)
pub const FTDI_FT4232H_PID: u16 = 0x6011;

/// FT232H product ID (single channel)
pub const FTDI_FT232H_PID: u16 = 0x6014;

/// FT230X/FT231X product ID (single channel, bit-bang only)
pub const FTDI_FT230X_PID: u16 = 0x6015;

// ============================================================================
// MPSSE Commands
// ============================================================================

/// Write bytes on negative clock edge (SPI mode 0/2)
pub const MPSSE_DO_WRITE: u8 = 0x10;

/// Read bytes on positive clock edge (SPI mode 0/2)
pub const MPSSE_DO_READ: u8 = 0x20;

/// Write on negative clock edge
pub const MPSSE_WRITE_NEG: u8 = 0x01;

/// Set data bits low byte
pub const SET_BITS_LOW: u8 = 0x80;

/// Disable loopback mode
pub const LOOPBACK_END: u8 = 0x85;

/// Set clock divisor
pub const TCK_DIVISOR: u8 = 0x86;

/// Send immediate (flush buffers)
pub const SEND_IMMEDIATE: u8 = 0x87;

/// Disable divide-by-5 prescaler (60 MHz clock)
pub const DIS_DIV_5: u8 = 0x8A;

/// Disable adaptive clocking
pub const CLK_NO_ADAPTIVE: u8 = 0x97;

/// Disable 3-phase clocking
pub const DIS_3_PHASE: u8 = 0x8D;

// ============================================================================
// Buffer sizes and clocks
// ============================================================================

/// FTDI hardware buffer size in bytes
pub const FTDI_HW_BUFFER_SIZE: usize = 4096;

/// Longest single MPSSE read or write command
pub const MPSSE_MAX_TRANSFER: usize = 65536;

/// MPSSE base clock of the high-speed ('H') devices
pub const BASE_CLOCK_HIGH_SPEED: u32 = 60_000_000;

/// MPSSE base clock of the full-speed devices
pub const BASE_CLOCK_FULL_SPEED: u32 = 12_000_000;

// ============================================================================
// Pin assignments (low byte)
//
// TCK/SK is bit 0.  (clock)
// TDI/DO is bit 1.  (data out)
// TDO/DI is bit 2.  (data in)
// TMS/CS is bit 3.  (first chip select)
// GPIOL0..3 are bits 4..7 (further chip selects)
// ============================================================================

/// Bit position for SK (clock)
pub const PIN_SK: u8 = 0;

/// Bit position for DO (data out / MOSI)
pub const PIN_DO: u8 = 1;

/// Bit position for DI (data in / MISO)
pub const PIN_DI: u8 = 2;

/// Bit position of the first MPSSE chip select line (ADBUS3)
pub const PIN_CS0: u8 = 3;

/// Number of chip select lines available in MPSSE mode (ADBUS3..ADBUS7)
pub const MPSSE_CS_COUNT: u8 = 5;

// ============================================================================
// Supported device types
// ============================================================================

/// Supported FTDI device types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtdiDeviceType {
    /// FT232R (single channel, bit-bang only)
    Ft232R,
    /// FT2232H (dual channel, 60 MHz)
    #[default]
    Ft2232H,
    /// FT4232H (quad channel, 60 MHz)
    Ft4232H,
    /// FT232H (single channel, 60 MHz)
    Ft232H,
    /// FT230X (single channel, bit-bang only)
    Ft230X,
}

impl FtdiDeviceType {
    /// All known device types
    pub const ALL: [FtdiDeviceType; 5] = [
        FtdiDeviceType::Ft232R,
        FtdiDeviceType::Ft2232H,
        FtdiDeviceType::Ft4232H,
        FtdiDeviceType::Ft232H,
        FtdiDeviceType::Ft230X,
    ];

    /// Get the product ID for this device type
    pub fn product_id(&self) -> u16 {
        match self {
            FtdiDeviceType::Ft232R => FTDI_FT232R_PID,
            FtdiDeviceType::Ft2232H => FTDI_FT2232H_PID,
            FtdiDeviceType::Ft4232H => FTDI_FT4232H_PID,
            FtdiDeviceType::Ft232H => FTDI_FT232H_PID,
            FtdiDeviceType::Ft230X => FTDI_FT230X_PID,
        }
    }

    /// Look up a device type by product ID
    pub fn from_product_id(pid: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.product_id() == pid)
    }

    /// Get the number of channels for this device type
    pub fn channel_count(&self) -> u8 {
        match self {
            FtdiDeviceType::Ft232R | FtdiDeviceType::Ft232H | FtdiDeviceType::Ft230X => 1,
            FtdiDeviceType::Ft2232H => 2,
            FtdiDeviceType::Ft4232H => 4,
        }
    }

    /// Whether this is a high-speed H-series part
    ///
    /// Only these run the 60 MHz clock and accept the clock divide-by-5,
    /// adaptive clocking and 3-phase clocking opcodes.
    pub fn is_high_speed(&self) -> bool {
        matches!(
            self,
            FtdiDeviceType::Ft2232H | FtdiDeviceType::Ft4232H | FtdiDeviceType::Ft232H
        )
    }

    /// Whether the channels have an MPSSE engine
    ///
    /// Every MPSSE part listed here is high speed; the full-speed FT2232D
    /// shares its product ID with the FT2232H and is not supported.
    pub fn has_mpsse(&self) -> bool {
        self.is_high_speed()
    }

    /// MPSSE base clock in Hz
    pub fn base_clock(&self) -> u32 {
        if self.is_high_speed() {
            BASE_CLOCK_HIGH_SPEED
        } else {
            BASE_CLOCK_FULL_SPEED
        }
    }

    /// Parse device type from a URL product name
    pub fn parse(s: &str) -> Option<Self> {
        let s_lower = s.to_lowercase();
        match s_lower.trim_start_matches("ft") {
            "232" | "232r" | "245r" => Some(FtdiDeviceType::Ft232R),
            "2232" | "2232h" => Some(FtdiDeviceType::Ft2232H),
            "4232" | "4232h" => Some(FtdiDeviceType::Ft4232H),
            "232h" => Some(FtdiDeviceType::Ft232H),
            "230x" | "231x" => Some(FtdiDeviceType::Ft230X),
            _ => None,
        }
    }

    /// Get the name of this device type
    pub fn name(&self) -> &'static str {
        match self {
            FtdiDeviceType::Ft232R => "FT232R",
            FtdiDeviceType::Ft2232H => "FT2232H",
            FtdiDeviceType::Ft4232H => "FT4232H",
            FtdiDeviceType::Ft232H => "FT232H",
            FtdiDeviceType::Ft230X => "FT230X",
        }
    }
}

/// FTDI interface/channel selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtdiInterface {
    /// Channel A (default)
    #[default]
    A,
    /// Channel B
    B,
    /// Channel C
    C,
    /// Channel D
    D,
}

impl FtdiInterface {
    /// Interface from its 1-based URL number
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(FtdiInterface::A),
            2 => Some(FtdiInterface::B),
            3 => Some(FtdiInterface::C),
            4 => Some(FtdiInterface::D),
            _ => None,
        }
    }

    /// Get the interface index (0-3)
    pub fn index(&self) -> u8 {
        match self {
            FtdiInterface::A => 0,
            FtdiInterface::B => 1,
            FtdiInterface::C => 2,
            FtdiInterface::D => 3,
        }
    }

    /// Get the channel letter
    pub fn letter(&self) -> char {
        (b'A' + self.index()) as char
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_names() {
        assert_eq!(FtdiDeviceType::parse("2232"), Some(FtdiDeviceType::Ft2232H));
        assert_eq!(FtdiDeviceType::parse("2232H"), Some(FtdiDeviceType::Ft2232H));
        assert_eq!(FtdiDeviceType::parse("ft232h"), Some(FtdiDeviceType::Ft232H));
        assert_eq!(FtdiDeviceType::parse("232r"), Some(FtdiDeviceType::Ft232R));
        assert_eq!(FtdiDeviceType::parse("4232h"), Some(FtdiDeviceType::Ft4232H));
        assert_eq!(FtdiDeviceType::parse("9999"), None);
        assert_eq!(FtdiDeviceType::parse("2232d"), None);
    }

    #[test]
    fn test_pid_round_trip_and_clocks() {
        for dev in FtdiDeviceType::ALL {
            assert_eq!(FtdiDeviceType::from_product_id(dev.product_id()), Some(dev));
        }
        assert_eq!(FtdiDeviceType::Ft232H.base_clock(), 60_000_000);
        assert!(!FtdiDeviceType::Ft232R.has_mpsse());
        assert!(!FtdiDeviceType::Ft230X.is_high_speed());
        assert_eq!(FtdiDeviceType::Ft230X.base_clock(), 12_000_000);
        assert!(FtdiDeviceType::Ft4232H.is_high_speed());
    }

    #[test]
    fn test_interface_numbers() {
        assert_eq!(FtdiInterface::from_number(1), Some(FtdiInterface::A));
        assert_eq!(FtdiInterface::from_number(4).map(|i| i.letter()), Some('D'));
        assert_eq!(FtdiInterface::from_number(0), None);
        assert_eq!(FtdiInterface::from_number(5), None);
    }
}
