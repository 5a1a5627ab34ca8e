//! Bridge modes and pin assignment

use std::fmt;
use std::str::FromStr;

use crate::error::{FtdiError, Result};
use crate::protocol::{MPSSE_CS_COUNT, PIN_CS0, PIN_DI, PIN_DO, PIN_SK};

/// How the FTDI channel drives the SPI bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FtdiMode {
    /// Synchronous GPIO bit-bang: every pin update returns a pin sample
    Sync,
    /// Asynchronous GPIO bit-bang: pins are read back after each update
    Async,
    /// Hardware SPI through the MPSSE engine
    #[default]
    Mpsse,
}

impl FtdiMode {
    /// Whether the SPI signals are generated in software
    pub fn is_bitbang(&self) -> bool {
        !matches!(self, FtdiMode::Mpsse)
    }

    /// Lowercase name, as used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            FtdiMode::Sync => "sync",
            FtdiMode::Async => "async",
            FtdiMode::Mpsse => "mpsse",
        }
    }
}

impl fmt::Display for FtdiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FtdiMode {
    type Err = FtdiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(FtdiMode::Sync),
            "async" => Ok(FtdiMode::Async),
            "mpsse" => Ok(FtdiMode::Mpsse),
            _ => Err(FtdiError::InvalidParameter(format!(
                "unknown mode '{}': must be sync, async or mpsse",
                s
            ))),
        }
    }
}

/// Physical pin (ADBUS bit 0-7) for each SPI signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpioPins {
    /// Clock
    pub sck: u8,
    /// Data from the bridge to the flash
    pub mosi: u8,
    /// Data from the flash to the bridge
    pub miso: u8,
    /// Chip select (active low)
    pub cs: u8,
}

impl Default for GpioPins {
    fn default() -> Self {
        Self {
            sck: PIN_SK,
            mosi: PIN_DO,
            miso: PIN_DI,
            cs: PIN_CS0,
        }
    }
}

impl GpioPins {
    /// Check that every pin exists and no pin is used twice
    pub fn validate(&self) -> Result<()> {
        let pins = [
            ("sck", self.sck),
            ("mosi", self.mosi),
            ("miso", self.miso),
            ("cs", self.cs),
        ];
        for (i, (name, pin)) in pins.iter().enumerate() {
            if *pin > 7 {
                return Err(FtdiError::InvalidPins(format!(
                    "{}={} is out of range (0-7)",
                    name, pin
                )));
            }
            if let Some((other, _)) = pins[..i].iter().find(|(_, p)| p == pin) {
                return Err(FtdiError::InvalidPins(format!(
                    "{} and {} both use pin {}",
                    other, name, pin
                )));
            }
        }
        Ok(())
    }

    /// Mask of the pins driven by the bridge
    pub fn output_mask(&self) -> u8 {
        (1 << self.sck) | (1 << self.mosi) | (1 << self.cs)
    }

    /// Pin state byte for the given line levels
    ///
    /// `cs_active` selects the chip, which pulls the active-low CS line down.
    pub fn levels(&self, cs_active: bool, sck: bool, mosi: bool) -> u8 {
        let mut byte = 0;
        if !cs_active {
            byte |= 1 << self.cs;
        }
        if sck {
            byte |= 1 << self.sck;
        }
        if mosi {
            byte |= 1 << self.mosi;
        }
        byte
    }

    /// MISO level in a sampled pin state byte
    pub fn miso_level(&self, sample: u8) -> bool {
        sample & (1 << self.miso) != 0
    }

    /// Chip select index to open the port with in the given mode
    ///
    /// The MPSSE engine numbers its CS lines from ADBUS3, so the configured
    /// pin is translated to that numbering. The bit-bang controller only
    /// knows the one CS line it was configured with.
    pub fn chip_select(&self, mode: FtdiMode) -> Result<u8> {
        if mode.is_bitbang() {
            return Ok(0);
        }

        let cs = self.cs.checked_sub(PIN_CS0).ok_or_else(|| {
            FtdiError::InvalidPins(format!(
                "cs={} is below ADBUS{}, the first MPSSE chip select",
                self.cs, PIN_CS0
            ))
        })?;
        if cs >= MPSSE_CS_COUNT {
            return Err(FtdiError::InvalidPins(format!(
                "cs={} is beyond the {} MPSSE chip select lines",
                self.cs, MPSSE_CS_COUNT
            )));
        }
        Ok(cs)
    }
}

impl fmt::Display for GpioPins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sck={},mosi={},miso={},cs={}",
            self.sck, self.mosi, self.miso, self.cs
        )
    }
}

impl FromStr for GpioPins {
    type Err = FtdiError;

    /// Parse `name=pin` pairs separated by commas; missing names keep their
    /// default pin
    fn from_str(s: &str) -> Result<Self> {
        let mut pins = GpioPins::default();

        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                FtdiError::InvalidPins(format!("'{}' is not a name=pin pair", pair))
            })?;
            let pin: u8 = value.trim().parse().map_err(|_| {
                FtdiError::InvalidPins(format!("'{}' is not a pin number", value))
            })?;
            match name.trim().to_ascii_lowercase().as_str() {
                "sck" | "clk" => pins.sck = pin,
                "mosi" | "do" => pins.mosi = pin,
                "miso" | "di" => pins.miso = pin,
                "cs" => pins.cs = pin,
                other => {
                    return Err(FtdiError::InvalidPins(format!("unknown pin name '{}'", other)))
                }
            }
        }

        pins.validate()?;
        Ok(pins)
    }
}
