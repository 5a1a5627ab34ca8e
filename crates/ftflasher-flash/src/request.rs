//! What a run should do

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use ftflasher_ftdi::{FtdiMode, GpioPins, DEFAULT_FREQUENCY};

use crate::error::{Result, RunError};

/// Default device URL: first FT2232H, channel A
pub const DEFAULT_DEVICE: &str = "ftdi://ftdi:2232h/1";

/// Operation to perform on the flash chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpiOperation {
    /// Identify the chip only
    ReadId,
    /// Dump a range to a file
    Read,
    /// Program a range from a file
    Write,
    /// Erase a range
    Erase,
}

impl SpiOperation {
    /// Name as used in requests and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SpiOperation::ReadId => "read_id",
            SpiOperation::Read => "read",
            SpiOperation::Write => "write",
            SpiOperation::Erase => "erase",
        }
    }

    /// Whether the operation changes flash contents
    pub fn is_destructive(&self) -> bool {
        matches!(self, SpiOperation::Write | SpiOperation::Erase)
    }
}

impl fmt::Display for SpiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpiOperation {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "read_id" => Ok(SpiOperation::ReadId),
            "read" => Ok(SpiOperation::Read),
            "write" => Ok(SpiOperation::Write),
            "erase" => Ok(SpiOperation::Erase),
            _ => Err(RunError::InvalidRequest(format!("unknown operation '{}'", s))),
        }
    }
}

/// Parameters of one run
///
/// Built once per invocation and consumed by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    /// Device URL (`ftdi://...` or `dummy://...`)
    pub device: String,
    /// How the bridge drives the bus
    pub mode: FtdiMode,
    /// SPI clock in Hz
    pub frequency: u32,
    /// Pin assignment
    pub pins: GpioPins,
    /// Operation to perform
    pub operation: SpiOperation,
    /// Image file: destination for reads, source for writes
    pub file: Option<PathBuf>,
    /// Flash address the range starts at
    pub offset: u32,
    /// Bytes of the source file to skip before the data to write
    pub skip: u64,
    /// Length of the range, or the rest of the chip/file when unset
    pub length: Option<u32>,
    /// Read back and compare after writing
    pub verify: bool,
    /// Chip database file or directory replacing the built-in one
    pub chip_db: Option<PathBuf>,
}

impl OperationRequest {
    /// Request with default link settings
    pub fn new(device: impl Into<String>, operation: SpiOperation) -> Self {
        Self {
            device: device.into(),
            mode: FtdiMode::default(),
            frequency: DEFAULT_FREQUENCY,
            pins: GpioPins::default(),
            operation,
            file: None,
            offset: 0,
            skip: 0,
            length: None,
            verify: true,
            chip_db: None,
        }
    }

    /// Set the bridge mode
    pub fn mode(mut self, mode: FtdiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the SPI clock
    pub fn frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Set the pin assignment
    pub fn pins(mut self, pins: GpioPins) -> Self {
        self.pins = pins;
        self
    }

    /// Set the image file
    pub fn file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Set the flash offset
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Set the file skip count
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Limit the range length
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Enable or disable verification after writing
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Use a chip database from disk
    pub fn chip_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.chip_db = Some(path.into());
        self
    }

    /// Check the request before opening the link
    pub fn validate(&self) -> Result<()> {
        if self.frequency == 0 {
            return Err(RunError::InvalidRequest(
                "frequency must be greater than zero".to_string(),
            ));
        }
        self.pins.validate()?;

        let needs_file = matches!(self.operation, SpiOperation::Read | SpiOperation::Write);
        if needs_file && self.file.is_none() {
            return Err(RunError::InvalidRequest(format!(
                "{} needs a file",
                self.operation
            )));
        }
        Ok(())
    }

    /// Chip select line for the configured mode and pins
    pub fn chip_select(&self) -> Result<u8> {
        Ok(self.pins.chip_select(self.mode)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names() {
        for op in [
            SpiOperation::ReadId,
            SpiOperation::Read,
            SpiOperation::Write,
            SpiOperation::Erase,
        ] {
            assert_eq!(op.to_string().parse::<SpiOperation>().unwrap(), op);
        }
        assert_eq!("read-id".parse::<SpiOperation>().unwrap(), SpiOperation::ReadId);
        assert!("program".parse::<SpiOperation>().is_err());
    }

    #[test]
    fn test_defaults() {
        let req = OperationRequest::new(DEFAULT_DEVICE, SpiOperation::ReadId);
        assert_eq!(req.mode, FtdiMode::Mpsse);
        assert_eq!(req.frequency, 1_000_000);
        assert!(req.verify);
        req.validate().unwrap();
    }

    #[test]
    fn test_read_and_write_need_a_file() {
        let req = OperationRequest::new(DEFAULT_DEVICE, SpiOperation::Write);
        assert!(matches!(req.validate(), Err(RunError::InvalidRequest(_))));
        req.file("image.bin").validate().unwrap();

        OperationRequest::new(DEFAULT_DEVICE, SpiOperation::Erase)
            .validate()
            .unwrap();
    }

    #[test]
    fn test_zero_frequency_rejected() {
        let req = OperationRequest::new(DEFAULT_DEVICE, SpiOperation::ReadId).frequency(0);
        assert!(matches!(req.validate(), Err(RunError::InvalidRequest(_))));
    }

    #[test]
    fn test_chip_select_by_mode() {
        let pins: GpioPins = "cs=6".parse().unwrap();
        let req = OperationRequest::new(DEFAULT_DEVICE, SpiOperation::ReadId).pins(pins);
        assert_eq!(req.clone().mode(FtdiMode::Mpsse).chip_select().unwrap(), 3);
        assert_eq!(req.clone().mode(FtdiMode::Sync).chip_select().unwrap(), 0);
        assert_eq!(req.mode(FtdiMode::Async).chip_select().unwrap(), 0);
    }
}
