//! Flash chip types and database
//!
//! This module provides types for describing flash chips and their
//! capabilities, as well as the JSON database of known chips.

mod database;
mod features;
mod types;

pub use database::*;
pub use features::Features;
pub use types::*;
