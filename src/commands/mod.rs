//! CLI command implementations
//!
//! Flash operations run on a worker thread through
//! [`ftflasher_flash::spawn`]; the foreground renders the events it sends
//! back.

mod list;
mod progress;
mod run;

pub use list::list_chips;
pub use run::run_operation;
