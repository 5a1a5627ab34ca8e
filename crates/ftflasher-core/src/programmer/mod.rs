//! Programmer traits and abstractions
//!
//! This module defines the traits that bridge controllers implement so the
//! protocol layer can talk to a flash chip through them.

pub mod bitbang;
mod traits;

pub use bitbang::BitbangSpiMaster;
pub use traits::*;
