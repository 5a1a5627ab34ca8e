//! SPI types and command structures
//!
//! This module provides types for representing SPI transactions and
//! the standard JEDEC opcodes.

mod address;
mod command;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::SpiCommand;
pub use opcodes::*;
