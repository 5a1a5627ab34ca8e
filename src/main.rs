//! ftflasher - SPI flash programmer for FTDI USB bridges
//!
//! Identifies, reads, writes and erases SPI NOR flash attached to an FTDI
//! FT232R/FT2232/FT4232/FT232H, either through the MPSSE engine or by
//! bit-banging the bus in synchronous or asynchronous mode.
//!
//! Every operation runs on a worker thread; this binary only turns command
//! line arguments into an [`OperationRequest`] and renders what comes back.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, LinkArgs};
use ftflasher_flash::{OperationRequest, SpiOperation};
use std::path::Path;

fn request_for(link: LinkArgs, operation: SpiOperation, chip_db: Option<&Path>) -> OperationRequest {
    let request = OperationRequest::new(link.device, operation)
        .mode(link.mode)
        .frequency(link.frequency)
        .pins(link.gpio);
    match chip_db {
        Some(path) => request.chip_db(path),
        None => request,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still takes precedence
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli::log_filter(cli.verbose)),
    )
    .init();

    let chip_db = cli.chip_db.as_deref();

    let result = match cli.command {
        Commands::ListChips { vendor } => {
            let db = match ftflasher_core::chip::initialize(chip_db) {
                Ok(db) => db,
                Err(e) => {
                    eprintln!("Failed to load chip database: {}", e);
                    std::process::exit(1);
                }
            };
            log::info!("Loaded {} chip definitions", db.len());
            commands::list_chips(db, vendor.as_deref());
            Ok(())
        }
        Commands::ReadId { link } => {
            commands::run_operation(request_for(link, SpiOperation::ReadId, chip_db))
        }
        Commands::Read {
            link,
            output,
            offset,
            length,
        } => {
            let mut request = request_for(link, SpiOperation::Read, chip_db)
                .file(output)
                .offset(offset);
            request.length = length;
            commands::run_operation(request)
        }
        Commands::Write {
            link,
            input,
            offset,
            skip,
            length,
            no_verify,
        } => {
            let mut request = request_for(link, SpiOperation::Write, chip_db)
                .file(input)
                .offset(offset)
                .skip(skip)
                .verify(!no_verify);
            request.length = length;
            commands::run_operation(request)
        }
        Commands::Erase {
            link,
            offset,
            length,
        } => {
            let mut request = request_for(link, SpiOperation::Erase, chip_db).offset(offset);
            request.length = length;
            commands::run_operation(request)
        }
    };

    result
}
