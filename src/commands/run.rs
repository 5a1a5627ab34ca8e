//! Running one flash operation with console output

use ftflasher_core::chip::format_size;
use ftflasher_flash::{
    spawn, CancelToken, FlashOperationRunner, OperationRequest, Outcome, Report, SpiOperation,
};
use std::sync::mpsc;

use super::progress::ConsoleView;

/// Run `request` on a worker thread, rendering its events until it ends
pub fn run_operation(request: OperationRequest) -> Result<(), Box<dyn std::error::Error>> {
    log::debug!(
        "Running {} on {} ({} mode, {} Hz)",
        request.operation,
        request.device,
        request.mode,
        request.frequency
    );

    let (tx, rx) = mpsc::channel();
    let handle = spawn(FlashOperationRunner::default(), request, tx)?;

    // Only one handler per process; later runs keep the first one
    if let Err(e) = ctrlc::set_handler(interrupt_handler(handle.cancel_token())) {
        log::debug!("Ctrl-C will not cancel this run: {}", e);
    }

    // The channel closes once the worker drops its sender
    let mut view = ConsoleView::new();
    for event in rx {
        view.handle(event);
    }
    view.finish();

    match handle.join()? {
        Outcome::Completed(report) => print_report(&report),
        Outcome::Cancelled => println!("Operation cancelled"),
    }
    Ok(())
}

/// Ctrl-C asks the worker to stop before its next erase or program step
fn interrupt_handler(token: CancelToken) -> impl FnMut() + Send + 'static {
    move || {
        if !token.is_cancelled() {
            eprintln!("Interrupted, stopping after the current step...");
        }
        token.cancel();
    }
}

fn print_report(report: &Report) {
    let range = format!(
        "0x{:08X}..0x{:08X}",
        report.offset,
        report.offset as u64 + report.length as u64
    );
    match report.operation {
        SpiOperation::ReadId => {}
        SpiOperation::Read => {
            println!("Read {} from {}", format_size(report.length), range);
        }
        SpiOperation::Write => {
            if let Some(stats) = &report.write {
                println!(
                    "Wrote {} to {}: {} sector(s) erased, {} unchanged, {} bytes programmed",
                    format_size(report.length),
                    range,
                    stats.sectors_erased,
                    stats.sectors_skipped,
                    stats.bytes_programmed
                );
            }
        }
        SpiOperation::Erase => match &report.erase {
            Some(stats) if stats.chip_erase => println!("Erased whole chip"),
            Some(stats) => println!(
                "Erased {} ({} block(s)) at {}",
                format_size(report.length),
                stats.blocks_erased,
                range
            ),
            None => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftflasher_flash::RunError;

    #[test]
    fn test_read_from_dummy_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.bin");
        let request = OperationRequest::new("dummy://EF4018", SpiOperation::Read)
            .file(&path)
            .length(0x2000);

        run_operation(request).unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 0x2000);
        assert!(data.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_interrupt_cancels_the_run() {
        let token = CancelToken::new();
        let mut handler = interrupt_handler(token.clone());
        handler();
        assert!(token.is_cancelled());
        handler();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_missing_flash_is_an_error() {
        let request = OperationRequest::new("dummy://000000", SpiOperation::ReadId);
        let err = run_operation(request).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunError>(),
            Some(RunError::NoFlashDetected)
        ));
    }
}
