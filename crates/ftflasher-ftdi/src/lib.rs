//! ftflasher-ftdi - FTDI USB to SPI bridge support
//!
//! This crate turns one channel of an FTDI USB bridge into an SPI master,
//! either through the MPSSE engine or by bit-banging the GPIO port.
//!
//! # Supported Devices
//!
//! - FTDI FT2232H (dual channel, 60 MHz, MPSSE or bit-bang)
//! - FTDI FT4232H (quad channel, 60 MHz, MPSSE or bit-bang)
//! - FTDI FT232H (single channel, 60 MHz, MPSSE or bit-bang)
//! - FTDI FT232R / FT230X (bit-bang only)
//!
//! # Example
//!
//! ```no_run
//! use ftflasher_ftdi::{open_spi, FtdiConfig, FtdiMode};
//!
//! let config = FtdiConfig::new("ftdi://ftdi:2232h/1")?
//!     .mode(FtdiMode::Mpsse)
//!     .frequency(10_000_000)?;
//! let mut spi = open_spi(&config)?;
//!
//! let id = ftflasher_core::protocol::read_jedec_id(&mut spi)?;
//! println!("JEDEC ID: {}", id);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Pins
//!
//! Pins are ADBUS bit numbers. The default assignment is the MPSSE one:
//! `sck=0,mosi=1,miso=2,cs=3`. In MPSSE mode the data pins are fixed and
//! only `cs` may move, to any of ADBUS3 to ADBUS7. In bit-bang modes every
//! signal may use any pin.

#![warn(missing_docs)]

mod config;
mod error;
pub mod gpio;
mod mode;
pub mod mpsse;
pub mod port;
pub mod protocol;
mod url;

pub use config::{FtdiConfig, DEFAULT_FREQUENCY};
#[cfg(feature = "libftdi")]
pub use config::open_spi;
pub use error::{FtdiError, Result};
pub use gpio::GpioSpi;
pub use mode::{FtdiMode, GpioPins};
pub use mpsse::{MpsseSettings, MpsseSpi};
pub use port::FtdiPort;
pub use protocol::{FtdiDeviceType, FtdiInterface};
pub use url::{DeviceSelector, FtdiUrl, SCHEME};
