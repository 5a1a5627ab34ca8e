//! Console rendering of run events

use ftflasher_flash::{Phase, Progress, RunEvent, RunObserver};
use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar for one phase of a transfer
fn create_progress_bar(total: u64, phase: Phase) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let template = format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
        phase
    );
    match ProgressStyle::default_bar().template(&template) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::debug!("Falling back to default progress style: {}", e),
    }
    pb
}

/// Lay out identify rows as `label: value` with the values aligned
pub fn format_rows(rows: &[(String, String)]) -> Vec<String> {
    let width = rows.iter().map(|(label, _)| label.len() + 1).max().unwrap_or(0);
    rows.iter()
        .map(|(label, value)| format!("{:<width$} {}", format!("{}:", label), value))
        .collect()
}

/// Prints messages and drives one progress bar per phase
#[derive(Default)]
pub struct ConsoleView {
    bar: Option<(Phase, ProgressBar)>,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one event received from the worker
    pub fn handle(&mut self, event: RunEvent) {
        match event {
            RunEvent::Message(message) => self.on_message(&message),
            RunEvent::ChipSummary(summary) => self.on_chip_summary(&summary),
            RunEvent::ChipInfo(rows) => self.on_chip_info(&rows),
            RunEvent::Progress(progress) => self.on_progress(progress),
        }
    }

    /// Close the current bar, leaving it on screen
    pub fn finish(&mut self) {
        if let Some((_, pb)) = self.bar.take() {
            pb.finish();
        }
    }

    fn println(&self, line: &str) {
        match &self.bar {
            Some((_, pb)) => pb.println(line),
            None => println!("{}", line),
        }
    }
}

impl RunObserver for ConsoleView {
    fn on_message(&mut self, message: &str) {
        self.println(message);
    }

    fn on_chip_summary(&mut self, summary: &str) {
        self.println(summary);
    }

    fn on_chip_info(&mut self, rows: &[(String, String)]) {
        for line in format_rows(rows) {
            self.println(&line);
        }
    }

    fn on_progress(&mut self, progress: Progress) {
        let same_phase = matches!(&self.bar, Some((phase, _)) if *phase == progress.phase);
        if !same_phase {
            self.finish();
            self.bar = Some((progress.phase, create_progress_bar(progress.total, progress.phase)));
        }
        if let Some((_, pb)) = &self.bar {
            pb.set_length(progress.total);
            pb.set_position(progress.done);
        }
        if progress.done >= progress.total {
            self.finish();
        }
    }
}

impl Drop for ConsoleView {
    fn drop(&mut self) {
        if let Some((_, pb)) = self.bar.take() {
            pb.abandon();
        }
    }
}
