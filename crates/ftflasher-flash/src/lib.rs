//! High-level flash operations over an FTDI SPI link
//!
//! This crate ties the pieces together: it opens the SPI link described by
//! an [`OperationRequest`], identifies the attached chip, and runs one
//! operation against it while reporting to a [`RunObserver`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      CLI (bin/ftflasher)                      │
//! │  - Builds an OperationRequest, renders RunObserver callbacks  │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   ftflasher-flash (this crate)                │
//! │  - FlashOperationRunner: identify / read / write / erase      │
//! │  - LinkProvider: opens ftdi:// and dummy:// links             │
//! │  - worker::spawn: background run with cancellation            │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!               ┌───────────────┴───────────────┐
//!               ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │     ftflasher-core       │   │  ftflasher-ftdi / -dummy     │
//! │  - SPI25 protocol        │   │  - Implement SpiMaster       │
//! │  - Range operations      │   │                              │
//! │  - Chip database         │   │                              │
//! └──────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use ftflasher_flash::{
//!     CancelToken, FlashOperationRunner, OperationRequest, Outcome, SpiOperation,
//! };
//!
//! let request = OperationRequest::new("ftdi://ftdi:2232h/1", SpiOperation::ReadId);
//! let runner = FlashOperationRunner::default();
//! let mut events = Vec::new();
//!
//! if let Outcome::Completed(report) = runner.run(&request, &mut events, &CancelToken::new())? {
//!     println!("{}", report.identity.summary());
//! }
//! # Ok::<(), ftflasher_flash::RunError>(())
//! ```

#![warn(missing_docs)]

mod error;
mod events;
mod identity;
mod link;
mod request;
mod runner;
pub mod worker;

pub use error::{Result, RunError};
pub use events::{NoObserver, Progress, RunEvent, RunObserver};
pub use identity::ChipIdentity;
pub use link::{parse_dummy_id, FtdiLinkProvider, LinkConfig, LinkProvider, DUMMY_SCHEME};
pub use request::{OperationRequest, SpiOperation, DEFAULT_DEVICE};
pub use runner::{FlashOperationRunner, Outcome, Report};
pub use worker::{spawn, CancelToken, RunHandle};

// Re-export the types callers need alongside a run
pub use ftflasher_core::chip::{ChipDatabase, FlashChip, JedecId};
pub use ftflasher_core::flash::{EraseStats, Phase, WriteStats};
pub use ftflasher_ftdi::{FtdiMode, GpioPins};
