//! Notifications sent while a run is in progress

use std::sync::mpsc::Sender;

use ftflasher_core::flash::Phase;

/// Position within the current phase of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// What is being done
    pub phase: Phase,
    /// Bytes finished so far
    pub done: u64,
    /// Bytes this phase covers
    pub total: u64,
}

impl Progress {
    /// Completion in percent, 100 for an empty phase
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (self.done.min(self.total) * 100 / self.total) as u8
    }
}

/// A single notification, for consumers that prefer a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Free-form status text
    Message(String),
    /// One-line description of the detected chip
    ChipSummary(String),
    /// Label/value rows of an identify report
    ChipInfo(Vec<(String, String)>),
    /// Transfer progress
    Progress(Progress),
}

/// Receives notifications from a run
///
/// All methods default to doing nothing.
pub trait RunObserver {
    /// Status text such as "Checking flash ID..."
    fn on_message(&mut self, _message: &str) {}

    /// The detected chip, as `Flash: <descriptor>` or `Flash: EF 40 18`
    fn on_chip_summary(&mut self, _summary: &str) {}

    /// Identify report rows
    fn on_chip_info(&mut self, _rows: &[(String, String)]) {}

    /// Transfer progress
    fn on_progress(&mut self, _progress: Progress) {}
}

impl<O: RunObserver + ?Sized> RunObserver for &mut O {
    fn on_message(&mut self, message: &str) {
        (**self).on_message(message)
    }

    fn on_chip_summary(&mut self, summary: &str) {
        (**self).on_chip_summary(summary)
    }

    fn on_chip_info(&mut self, rows: &[(String, String)]) {
        (**self).on_chip_info(rows)
    }

    fn on_progress(&mut self, progress: Progress) {
        (**self).on_progress(progress)
    }
}

// A closed receiver means nobody is listening any more; the run goes on.
impl RunObserver for Sender<RunEvent> {
    fn on_message(&mut self, message: &str) {
        let _ = self.send(RunEvent::Message(message.to_string()));
    }

    fn on_chip_summary(&mut self, summary: &str) {
        let _ = self.send(RunEvent::ChipSummary(summary.to_string()));
    }

    fn on_chip_info(&mut self, rows: &[(String, String)]) {
        let _ = self.send(RunEvent::ChipInfo(rows.to_vec()));
    }

    fn on_progress(&mut self, progress: Progress) {
        let _ = self.send(RunEvent::Progress(progress));
    }
}

/// Collects every notification in order
impl RunObserver for Vec<RunEvent> {
    fn on_message(&mut self, message: &str) {
        self.push(RunEvent::Message(message.to_string()));
    }

    fn on_chip_summary(&mut self, summary: &str) {
        self.push(RunEvent::ChipSummary(summary.to_string()));
    }

    fn on_chip_info(&mut self, rows: &[(String, String)]) {
        self.push(RunEvent::ChipInfo(rows.to_vec()));
    }

    fn on_progress(&mut self, progress: Progress) {
        self.push(RunEvent::Progress(progress));
    }
}

/// Ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObserver;

impl RunObserver for NoObserver {}
