//! ftflasher-core - Core library for SPI flash programming
//!
//! This crate provides the protocol-level building blocks used by ftflasher:
//! SPI command descriptions, the [`programmer::SpiMaster`] trait that bridge
//! controllers implement, JEDEC SPI25 command sequences, the JSON chip
//! database and the byte-range read/write/erase operations built on top of
//! them.
//!
//! # Example
//!
//! ```ignore
//! use ftflasher_core::{chip::ChipDatabase, programmer::SpiMaster, protocol};
//!
//! fn identify<M: SpiMaster>(master: &mut M, db: &ChipDatabase) {
//!     let id = protocol::read_jedec_id(master).unwrap();
//!     match db.find_by_jedec_id(id.manufacturer(), id.device()) {
//!         Some(chip) => println!("Found: {}", chip),
//!         None => println!("Unknown chip {}", id),
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod chip;
pub mod error;
pub mod flash;
pub mod programmer;
pub mod protocol;
pub mod spi;

pub use error::{Error, Result};
