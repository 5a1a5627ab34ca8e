//! Error types for flash operation runs

use std::io;
use std::path::PathBuf;

use ftflasher_core::chip::{ChipDbError, JedecId};
use ftflasher_ftdi::FtdiError;
use thiserror::Error;

/// Result type for runner operations
pub type Result<T> = std::result::Result<T, RunError>;

/// Why a run failed
#[derive(Debug, Error)]
pub enum RunError {
    /// The request cannot be carried out as given
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The SPI link could not be established
    #[error("link error: {0}")]
    Link(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A SPI or flash level failure
    #[error(transparent)]
    Flash(#[from] ftflasher_core::Error),

    /// The chip database could not be loaded
    #[error("chip database: {0}")]
    ChipDatabase(#[from] ChipDbError),

    /// Nothing answered the JEDEC ID query
    #[error("no serial flash detected")]
    NoFlashDetected,

    /// The chip answered with an ID the database does not know
    #[error("unknown flash chip (JEDEC ID {jedec})")]
    UnknownFlashChip {
        /// ID read from the chip
        jedec: JedecId,
    },

    /// Reading or writing the image file failed
    #[error("{}: {source}", path.display())]
    File {
        /// File being accessed
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// The background worker died without reporting
    #[error("worker thread panicked")]
    WorkerPanicked,
}

impl RunError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RunError::File {
            path: path.into(),
            source,
        }
    }
}

impl From<FtdiError> for RunError {
    fn from(e: FtdiError) -> Self {
        match e {
            FtdiError::InvalidUrl { .. }
            | FtdiError::InvalidChannel(_)
            | FtdiError::InvalidPins(_)
            | FtdiError::InvalidParameter(_) => RunError::InvalidRequest(e.to_string()),
            other => RunError::Link(Box::new(other)),
        }
    }
}
