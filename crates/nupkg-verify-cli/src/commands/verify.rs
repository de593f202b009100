//! Verify command implementation

use crate::cli::Cli;
use crate::error::add_package_context;
use crate::output::ReportPrinter;
use crate::progress::CliProgress;
use anyhow::Result;
use nupkg_verify_core::InspectionProgress;
use nupkg_verify_core::ManifestExpectation;
use nupkg_verify_core::NoopProgress;
use nupkg_verify_core::signature::AuthenticodeInspector;
use nupkg_verify_core::verify_package;

/// Runs the verification and prints the report.
///
/// Returns whether every check passed. Errors are fatal conditions only.
pub fn execute(cli: &Cli, printer: &dyn ReportPrinter) -> Result<bool> {
    let expectation = match &cli.expectations {
        Some(path) => add_package_context(
            ManifestExpectation::from_json_file(path, &cli.version),
            &cli.file_path,
        )?,
        None => ManifestExpectation::msal(&cli.version),
    };
    tracing::debug!(
        table = ?cli.expectations,
        checks = expectation.metadata.len() + expectation.inventory.checks().len(),
        "expectation table ready"
    );

    printer.loading(&cli.file_path);

    let mut progress: Box<dyn InspectionProgress> =
        if printer.shows_progress() && CliProgress::should_show() {
            Box::new(CliProgress::new("Inspecting"))
        } else {
            Box::new(NoopProgress)
        };

    let outcome = add_package_context(
        verify_package(
            &cli.file_path,
            &expectation,
            &AuthenticodeInspector::new(),
            progress.as_mut(),
        ),
        &cli.file_path,
    )?;
    drop(progress);

    printer.outcome(&outcome)?;
    Ok(outcome.passed())
}
