//! Catalog demo entry point.
//!
//! # Responsibility
//! - Read configuration from the environment and initialize logging.
//! - Run the catalog once and print its transcript to stdout.
//!
//! # Invariants
//! - Connection and step failures are part of the transcript, not the exit code.

use catalog_core::{init_logging, run_all, write_outcome, CatalogConfig};
use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = match CatalogConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(&config.log_level, config.log_dir.as_deref()) {
        eprintln!("logging init failed: {err}");
        return ExitCode::FAILURE;
    }
    log::info!(
        "event=cli_start module=cli status=ok version={}",
        catalog_core::core_version()
    );

    let outcome = run_all(&config);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(err) = write_outcome(&mut out, &outcome).and_then(|()| out.flush()) {
        log::error!("event=cli_output module=cli status=error error={err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
