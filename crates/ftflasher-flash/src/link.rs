//! Opening the SPI link to the flash chip

use ftflasher_core::chip::{ChipDatabase, JedecId};
use ftflasher_core::programmer::SpiMaster;
use ftflasher_dummy::{DummyConfig, DummyFlash};
use ftflasher_ftdi::{FtdiMode, GpioPins};

use crate::error::{Result, RunError};

/// URL scheme of the in-memory emulator
pub const DUMMY_SCHEME: &str = "dummy://";

/// JEDEC ID emulated by a bare `dummy://` URL
pub const DUMMY_DEFAULT_ID: JedecId = JedecId([0xEF, 0x40, 0x18]);

/// Emulated size when the database does not know the dummy's ID
const DUMMY_FALLBACK_SIZE: usize = 16 * 1024 * 1024;

/// Link settings derived from a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Device URL
    pub url: String,
    /// Bridge mode
    pub mode: FtdiMode,
    /// SPI clock in Hz
    pub frequency: u32,
    /// Pin assignment; the chip select line follows from it and the mode
    pub pins: GpioPins,
}

/// Source of SPI links
///
/// The returned link is owned by the caller; dropping it closes the bridge
/// and releases its pins.
pub trait LinkProvider {
    /// Open a link with the given settings
    fn open(&self, config: &LinkConfig) -> Result<Box<dyn SpiMaster>>;
}

impl<L: LinkProvider + ?Sized> LinkProvider for &L {
    fn open(&self, config: &LinkConfig) -> Result<Box<dyn SpiMaster>> {
        (**self).open(config)
    }
}

/// Opens FTDI bridges, and the emulator for `dummy://` URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct FtdiLinkProvider;

impl LinkProvider for FtdiLinkProvider {
    fn open(&self, config: &LinkConfig) -> Result<Box<dyn SpiMaster>> {
        let url = config.url.as_str();
        if has_scheme(url, DUMMY_SCHEME) {
            return open_dummy(&url[DUMMY_SCHEME.len()..]);
        }
        if has_scheme(url, ftflasher_ftdi::SCHEME) {
            return open_ftdi(config);
        }
        Err(RunError::InvalidRequest(format!(
            "unsupported device URL '{}' (expected {}... or {}...)",
            url,
            ftflasher_ftdi::SCHEME,
            DUMMY_SCHEME
        )))
    }
}

fn has_scheme(url: &str, scheme: &str) -> bool {
    url.get(..scheme.len())
        .is_some_and(|s| s.eq_ignore_ascii_case(scheme))
}

/// Parse the part of a dummy URL after the scheme: empty or 6 hex digits
pub fn parse_dummy_id(rest: &str) -> Result<JedecId> {
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return Ok(DUMMY_DEFAULT_ID);
    }
    if rest.len() != 6 {
        return Err(RunError::InvalidRequest(format!(
            "dummy JEDEC ID '{}' must be 6 hex digits",
            rest
        )));
    }
    u32::from_str_radix(rest, 16)
        .map(JedecId::from)
        .map_err(|_| RunError::InvalidRequest(format!("dummy JEDEC ID '{}' is not hex", rest)))
}

fn open_dummy(rest: &str) -> Result<Box<dyn SpiMaster>> {
    let id = parse_dummy_id(rest)?;
    let size = ChipDatabase::builtin()?
        .find_by_jedec_id(id.manufacturer(), id.device())
        .map(|chip| chip.total_size as usize)
        .unwrap_or(DUMMY_FALLBACK_SIZE);

    log::info!("Using emulated flash with JEDEC ID {} ({} bytes)", id, size);
    let config = DummyConfig::default().jedec_id(id.0).size(size);
    Ok(Box::new(DummyFlash::new(config)))
}

#[cfg(feature = "libftdi")]
fn open_ftdi(config: &LinkConfig) -> Result<Box<dyn SpiMaster>> {
    let ftdi = ftflasher_ftdi::FtdiConfig::new(&config.url)?
        .mode(config.mode)
        .frequency(config.frequency)?
        .pins(config.pins)?;
    log::debug!(
        "Opening {} ({} mode, {} Hz, CS{})",
        ftdi.url,
        ftdi.mode,
        ftdi.frequency,
        ftdi.chip_select()?
    );
    Ok(ftflasher_ftdi::open_spi(&ftdi)?)
}

#[cfg(not(feature = "libftdi"))]
fn open_ftdi(config: &LinkConfig) -> Result<Box<dyn SpiMaster>> {
    ftflasher_ftdi::FtdiConfig::new(&config.url)?;
    Err(RunError::Link(
        "built without FTDI hardware support (enable the libftdi feature)".into(),
    ))
}
