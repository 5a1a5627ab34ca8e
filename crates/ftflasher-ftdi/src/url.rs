//! FTDI device URLs
//!
//! Devices are named with pyftdi style URLs:
//!
//! ```text
//! ftdi://[vendor[:product[:index|:serial]]]/interface
//! ```
//!
//! - `vendor` is `ftdi` or a hex VID (`0x0403`)
//! - `product` is a name such as `232h`, `2232h`, `4232h` or a hex PID
//! - the third field selects among identical devices, either by a decimal
//!   index (0 is the first device found) or by USB serial number
//! - `interface` is the channel number, `1` for A up to `4` for D

use std::fmt;
use std::str::FromStr;

use crate::error::{FtdiError, Result};
use crate::protocol::{FtdiDeviceType, FtdiInterface, FTDI_VID};

/// URL scheme for FTDI devices
pub const SCHEME: &str = "ftdi://";

/// How to pick one device when several match the VID/PID
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    /// First matching device
    #[default]
    First,
    /// N-th matching device in enumeration order
    Index(usize),
    /// Device with this USB serial number
    Serial(String),
}

/// Parsed FTDI device URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtdiUrl {
    /// USB vendor ID
    pub vendor_id: u16,
    /// Device type (determines PID and channel count)
    pub device_type: FtdiDeviceType,
    /// Device selection among identical adapters
    pub selector: DeviceSelector,
    /// Interface/channel to use
    pub interface: FtdiInterface,
}

impl Default for FtdiUrl {
    fn default() -> Self {
        Self {
            vendor_id: FTDI_VID,
            device_type: FtdiDeviceType::default(),
            selector: DeviceSelector::First,
            interface: FtdiInterface::A,
        }
    }
}

fn parse_hex_u16(s: &str) -> Option<u16> {
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    u16::from_str_radix(hex, 16).ok()
}

impl FtdiUrl {
    /// Parse a device URL
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .get(..SCHEME.len())
            .filter(|scheme| scheme.eq_ignore_ascii_case(SCHEME))
            .map(|_| &url[SCHEME.len()..])
            .ok_or_else(|| FtdiError::invalid_url(url, "scheme must be ftdi://"))?;

        let (device, interface) = rest
            .rsplit_once('/')
            .ok_or_else(|| FtdiError::invalid_url(url, "missing /interface"))?;

        let mut fields = device.split(':');
        let vendor = fields.next().unwrap_or("");
        let product = fields.next().unwrap_or("");
        let selector = fields.next().unwrap_or("");
        if fields.next().is_some() {
            return Err(FtdiError::invalid_url(url, "too many ':' separated fields"));
        }

        let vendor_id = match vendor.to_ascii_lowercase().as_str() {
            "" | "ftdi" => FTDI_VID,
            other => parse_hex_u16(other)
                .ok_or_else(|| FtdiError::invalid_url(url, format!("unknown vendor '{}'", vendor)))?,
        };

        let device_type = if product.is_empty() {
            FtdiDeviceType::default()
        } else if let Some(pid) = parse_hex_u16(product) {
            FtdiDeviceType::from_product_id(pid).ok_or_else(|| {
                FtdiError::invalid_url(url, format!("unsupported product ID 0x{:04x}", pid))
            })?
        } else {
            FtdiDeviceType::parse(product).ok_or_else(|| {
                FtdiError::invalid_url(url, format!("unknown product '{}'", product))
            })?
        };

        let selector = if selector.is_empty() {
            DeviceSelector::First
        } else if selector.bytes().all(|b| b.is_ascii_digit()) {
            let index = selector
                .parse()
                .map_err(|_| FtdiError::invalid_url(url, "device index out of range"))?;
            DeviceSelector::Index(index)
        } else {
            DeviceSelector::Serial(selector.to_string())
        };

        let interface = if interface.is_empty() {
            FtdiInterface::A
        } else {
            interface
                .parse::<u8>()
                .ok()
                .and_then(FtdiInterface::from_number)
                .ok_or_else(|| {
                    FtdiError::invalid_url(
                        url,
                        format!("interface '{}' must be a number from 1 to 4", interface),
                    )
                })?
        };

        if interface.index() >= device_type.channel_count() {
            return Err(FtdiError::InvalidChannel(format!(
                "interface {} not available on {} ({} channel(s))",
                interface.index() + 1,
                device_type.name(),
                device_type.channel_count()
            )));
        }

        Ok(Self {
            vendor_id,
            device_type,
            selector,
            interface,
        })
    }

    /// USB product ID
    pub fn product_id(&self) -> u16 {
        self.device_type.product_id()
    }
}

impl FromStr for FtdiUrl {
    type Err = FtdiError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FtdiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SCHEME)?;
        if self.vendor_id == FTDI_VID {
            write!(f, "ftdi")?;
        } else {
            write!(f, "0x{:04x}", self.vendor_id)?;
        }
        write!(f, ":0x{:04x}", self.product_id())?;
        match &self.selector {
            DeviceSelector::First => {}
            DeviceSelector::Index(i) => write!(f, ":{}", i)?,
            DeviceSelector::Serial(s) => write!(f, ":{}", s)?,
        }
        write!(f, "/{}", self.interface.index() + 1)
    }
}
