//! Error types for ftflasher-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // SPI errors
    /// The bridge failed to carry out a SPI transfer
    ///
    /// Holds the bridge's own description of the failure.
    #[error("SPI transfer failed: {0}")]
    Transport(String),
    /// Opcode is not supported by the programmer
    #[error("SPI opcode not supported by programmer")]
    OpcodeNotSupported,

    // Operation errors
    /// Erase command did not complete
    #[error("erase failed at address 0x{addr:08X}")]
    EraseError {
        /// Start of the block being erased
        addr: u32,
    },
    /// Verify operation failed (data mismatch)
    #[error("verify failed: data mismatch at 0x{addr:08X}")]
    VerifyError {
        /// First address that differs
        addr: u32,
    },
    /// Chip did not leave the busy state in time
    #[error("operation timed out")]
    Timeout,
    /// The operation was cancelled before it finished
    #[error("operation aborted")]
    Aborted,

    // Address/size errors
    /// Address is beyond flash chip size
    #[error("address out of bounds")]
    AddressOutOfBounds,
    /// Operation requires aligned address or size
    #[error("invalid alignment: range must be aligned to {0} bytes")]
    InvalidAlignment(u32),

    // Protection errors
    /// Flash chip rejected a write or erase (write enable latch not set)
    #[error("flash chip is write protected")]
    WriteProtected,
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
