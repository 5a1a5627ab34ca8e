//! Error types for the FTDI bridge

use thiserror::Error;

/// Result type for FTDI operations
pub type Result<T> = std::result::Result<T, FtdiError>;

/// Errors that can occur during FTDI operations
#[derive(Debug, Error)]
pub enum FtdiError {
    /// Device URL could not be parsed
    #[error("invalid device URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as given
        url: String,
        /// What is wrong with it
        reason: String,
    },

    /// Invalid channel/interface specification
    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    /// Pin assignment is unusable
    #[error("invalid pin assignment: {0}")]
    InvalidPins(String),

    /// Invalid parameter
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Failed to open device
    #[error("failed to open device: {0}")]
    OpenFailed(String),

    /// Failed to configure device
    #[error("failed to configure device: {0}")]
    ConfigFailed(String),

    /// USB transfer failed
    #[error("USB transfer failed: {0}")]
    TransferFailed(String),

    /// libftdi error
    #[error("libftdi error: {0}")]
    LibFtdi(String),
}

impl FtdiError {
    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        FtdiError::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(feature = "libftdi")]
impl From<ftdi::Error> for FtdiError {
    fn from(e: ftdi::Error) -> Self {
        FtdiError::LibFtdi(e.to_string())
    }
}
