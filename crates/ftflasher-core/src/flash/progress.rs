//! Progress reporting for long-running flash operations

use std::fmt;

/// Step of a flash operation that is being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Reading flash contents
    Reading,
    /// Erasing blocks
    Erasing,
    /// Programming pages
    Writing,
    /// Reading back and comparing
    Verifying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Reading => "Reading",
            Phase::Erasing => "Erasing",
            Phase::Writing => "Writing",
            Phase::Verifying => "Verifying",
        };
        f.write_str(s)
    }
}

/// Callback for progress reporting and cooperative cancellation
///
/// `should_abort` is consulted before every chunk that is read and, more
/// importantly, before every erase or program command is issued. Returning
/// `true` makes the operation stop with [`Error::Aborted`](crate::Error::Aborted).
pub trait OperationProgress {
    /// A new phase starts that will cover `total` bytes
    fn start(&mut self, phase: Phase, total: u64);

    /// `done` bytes of the current phase are finished
    fn advance(&mut self, done: u64);

    /// Whether the caller asked to stop
    fn should_abort(&self) -> bool {
        false
    }
}

/// A no-op progress reporter
pub struct NoProgress;

impl OperationProgress for NoProgress {
    fn start(&mut self, _phase: Phase, _total: u64) {}
    fn advance(&mut self, _done: u64) {}
}
