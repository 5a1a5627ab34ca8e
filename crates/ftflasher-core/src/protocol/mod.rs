//! Protocol implementations
//!
//! This module contains the JEDEC SPI25 command sequences used to talk to
//! serial NOR flash.

mod spi25;

pub use spi25::*;
