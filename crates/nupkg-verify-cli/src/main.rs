//! nupkg-verify - release gate that checks a NuGet package against its
//! expected manifest.
//!
//! Exit codes: `0` every check passed, `1` at least one check failed, `2`
//! invalid arguments, `3` the package or expectation table could not be
//! processed.

mod cli;
mod commands;
mod error;
mod output;
mod progress;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_CHECKS_FAILED: u8 = 1;
const EXIT_FATAL: u8 = 3;

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    let printer = output::printer_for(&cli);

    match commands::verify::execute(&cli, &*printer) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_CHECKS_FAILED),
        Err(err) => {
            printer.fatal(&err);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
