//! Bridge configuration and opening

use crate::error::{FtdiError, Result};
use crate::mode::{FtdiMode, GpioPins};
use crate::mpsse::MpsseSettings;
use crate::url::FtdiUrl;

/// Default SPI clock in Hz
pub const DEFAULT_FREQUENCY: u32 = 1_000_000;

/// Everything needed to open one FTDI channel as an SPI master
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtdiConfig {
    /// Which device and channel
    pub url: FtdiUrl,
    /// How the bus is driven
    pub mode: FtdiMode,
    /// SPI clock in Hz
    pub frequency: u32,
    /// Pin assignment
    pub pins: GpioPins,
}

impl Default for FtdiConfig {
    fn default() -> Self {
        Self {
            url: FtdiUrl::default(),
            mode: FtdiMode::default(),
            frequency: DEFAULT_FREQUENCY,
            pins: GpioPins::default(),
        }
    }
}

impl FtdiConfig {
    /// Configuration for a device URL with default settings
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            url: FtdiUrl::parse(url)?,
            ..Self::default()
        })
    }

    /// Set the bus mode
    pub fn mode(mut self, mode: FtdiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the SPI clock frequency
    pub fn frequency(mut self, frequency: u32) -> Result<Self> {
        if frequency == 0 {
            return Err(FtdiError::InvalidParameter(
                "frequency must be greater than zero".to_string(),
            ));
        }
        self.frequency = frequency;
        Ok(self)
    }

    /// Set the pin assignment
    pub fn pins(mut self, pins: GpioPins) -> Result<Self> {
        pins.validate()?;
        self.pins = pins;
        Ok(self)
    }

    /// Chip select index for the configured mode and pins
    pub fn chip_select(&self) -> Result<u8> {
        self.pins.chip_select(self.mode)
    }

    /// Check the combination of settings before touching hardware
    pub fn validate(&self) -> Result<()> {
        if self.frequency == 0 {
            return Err(FtdiError::InvalidParameter(
                "frequency must be greater than zero".to_string(),
            ));
        }
        self.pins.validate()?;
        if self.mode == FtdiMode::Mpsse && !self.url.device_type.has_mpsse() {
            return Err(FtdiError::InvalidParameter(format!(
                "{} has no MPSSE engine, use sync or async mode",
                self.url.device_type.name()
            )));
        }
        self.chip_select()?;
        Ok(())
    }

    /// MPSSE engine settings
    pub fn mpsse_settings(&self) -> Result<MpsseSettings> {
        Ok(MpsseSettings {
            device_type: self.url.device_type,
            frequency: self.frequency,
            chip_select: self.chip_select()?,
        })
    }

    /// Bit-bang pin update rate
    ///
    /// Each SPI clock period takes two pin updates.
    pub fn bitbang_rate(&self) -> u32 {
        self.frequency.saturating_mul(2)
    }
}

#[cfg(feature = "libftdi")]
mod open {
    use ftdi::{find_by_vid_pid, BitMode, Interface};
    use ftflasher_core::programmer::SpiMaster;

    use super::FtdiConfig;
    use crate::error::{FtdiError, Result};
    use crate::gpio::GpioSpi;
    use crate::mode::FtdiMode;
    use crate::mpsse::MpsseSpi;
    use crate::protocol::FtdiInterface;
    use crate::url::DeviceSelector;

    /// Open the configured channel and return it as an SPI master
    pub fn open_spi(config: &FtdiConfig) -> Result<Box<dyn SpiMaster>> {
        config.validate()?;

        if config.url.selector != DeviceSelector::First {
            return Err(FtdiError::OpenFailed(format!(
                "{}: selecting a device by index or serial is not supported, \
                 connect a single adapter and omit the selector",
                config.url
            )));
        }

        let interface = match config.url.interface {
            FtdiInterface::A => Interface::A,
            FtdiInterface::B => Interface::B,
            FtdiInterface::C => Interface::C,
            FtdiInterface::D => Interface::D,
        };

        log::info!(
            "Opening FTDI {} channel {} in {} mode",
            config.url.device_type.name(),
            config.url.interface.letter(),
            config.mode
        );
        log::debug!(
            "Looking for FTDI device VID={:04X} PID={:04X}",
            config.url.vendor_id,
            config.url.product_id()
        );

        let mut device = find_by_vid_pid(config.url.vendor_id, config.url.product_id())
            .interface(interface)
            .open()
            .map_err(|e| FtdiError::OpenFailed(format!("{}: {}", config.url, e)))?;

        device
            .usb_reset()
            .map_err(|e| FtdiError::ConfigFailed(format!("USB reset failed: {}", e)))?;
        device
            .set_latency_timer(2)
            .map_err(|e| FtdiError::ConfigFailed(format!("set latency timer failed: {}", e)))?;

        match config.mode {
            FtdiMode::Mpsse => {
                device
                    .set_bitmode(0x00, BitMode::Mpsse)
                    .map_err(|e| FtdiError::ConfigFailed(format!("set MPSSE mode failed: {}", e)))?;
                let spi = MpsseSpi::new(device, config.mpsse_settings()?)?;
                Ok(Box::new(spi))
            }
            FtdiMode::Sync | FtdiMode::Async => {
                let bitmode = if config.mode == FtdiMode::Sync {
                    BitMode::SyncBB
                } else {
                    BitMode::Bitbang
                };
                device
                    .set_bitmode(config.pins.output_mask(), bitmode)
                    .map_err(|e| FtdiError::ConfigFailed(format!("set bit-bang mode failed: {}", e)))?;
                device
                    .set_baud_rate(config.bitbang_rate())
                    .map_err(|e| FtdiError::ConfigFailed(format!("set pin rate failed: {}", e)))?;
                device
                    .usb_purge_buffers()
                    .map_err(|e| FtdiError::ConfigFailed(format!("purge failed: {}", e)))?;
                let spi = GpioSpi::new(device, config.mode, config.pins)?;
                Ok(Box::new(spi))
            }
        }
    }
}

#[cfg(feature = "libftdi")]
pub use open::open_spi;
