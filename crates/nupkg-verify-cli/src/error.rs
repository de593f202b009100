//! Error conversion utilities for CLI.
//!
//! Converts nupkg-verify-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use nupkg_verify_core::VerifyError;
use std::path::Path;

/// Converts `VerifyError` to user-friendly anyhow error with context
pub fn convert_verify_error(err: VerifyError, package: &Path) -> anyhow::Error {
    match err {
        VerifyError::Io(io_err) => {
            anyhow!(
                "I/O error while reading '{}': {}\n\
                 HINT: Check that --filePath points to an existing, readable file.",
                package.display(),
                io_err
            )
        }
        VerifyError::InvalidArchive(reason) => {
            anyhow!(
                "Invalid package '{}': {}\n\
                 HINT: The file is not a zip archive or is corrupted. Re-download the .nupkg.",
                package.display(),
                reason
            )
        }
        VerifyError::MissingManifest => {
            anyhow!(
                "Package '{}' has no .nuspec manifest at its root\n\
                 HINT: This does not look like a NuGet package.",
                package.display()
            )
        }
        VerifyError::InvalidManifest(reason) => {
            anyhow!(
                "Invalid manifest in '{}': {}\n\
                 HINT: The .nuspec must be well-formed XML with <id> and <version>.",
                package.display(),
                reason
            )
        }
        VerifyError::Inspection { path, source } => {
            anyhow!(
                "Failed to inspect '{}' in '{}': {}\n\
                 HINT: Make sure the temporary directory is writable and has free space.",
                path,
                package.display(),
                source
            )
        }
        VerifyError::InvalidExpectation { .. } => anyhow::Error::from(err)
            .context("HINT: Check the --expectations file against the documented table format."),
        _ => anyhow::Error::from(err)
            .context(format!("Error processing package '{}'", package.display())),
    }
}

/// Adds context to a core error about the package being verified
pub fn add_package_context<T>(
    result: Result<T, VerifyError>,
    package: &Path,
) -> anyhow::Result<T> {
    result.map_err(|e| convert_verify_error(e, package))
}
