//! Running an operation on a background thread

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{Result, RunError};
use crate::events::RunObserver;
use crate::link::LinkProvider;
use crate::request::OperationRequest;
use crate::runner::{FlashOperationRunner, Outcome};

/// Shared stop flag
///
/// Clones refer to the same flag. The runner checks it between steps and
/// before every erase or program command.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to a run on a worker thread
#[derive(Debug)]
pub struct RunHandle {
    thread: JoinHandle<Result<Outcome>>,
    cancel: CancelToken,
}

impl RunHandle {
    /// Ask the worker to stop at the next opportunity
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The token the worker watches
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Whether the worker has finished
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker and return its outcome
    pub fn join(self) -> Result<Outcome> {
        self.thread.join().unwrap_or(Err(RunError::WorkerPanicked))
    }
}

/// Start `request` on a new worker thread
///
/// Notifications are delivered to `observer` from the worker thread.
pub fn spawn<L, O>(
    runner: FlashOperationRunner<L>,
    request: OperationRequest,
    mut observer: O,
) -> io::Result<RunHandle>
where
    L: LinkProvider + Send + 'static,
    O: RunObserver + Send + 'static,
{
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let thread = thread::Builder::new()
        .name(format!("ftflasher-{}", request.operation))
        .spawn(move || runner.run(&request, &mut observer, &token))?;
    Ok(RunHandle { thread, cancel })
}
