//! High-level flash operations
//!
//! This module provides byte-range operations for reading, writing,
//! erasing and verifying flash chips.

mod context;
mod operations;
mod progress;

pub use context::{AddressMode, FlashContext};
pub use operations::*;
pub use progress::{NoProgress, OperationProgress, Phase};
