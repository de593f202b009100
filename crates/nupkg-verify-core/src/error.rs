//! Error types for package inspection.
//!
//! Only conditions that make the package unusable are errors. A field that
//! does not match its expectation is reported as a failed
//! [`ValidationResult`](crate::ValidationResult), never as an error.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `VerifyError`.
pub type Result<T> = std::result::Result<T, VerifyError>;

/// Errors that abort a verification run.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a readable zip archive.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// The archive has no `.nuspec` manifest at its root.
    #[error("package manifest (.nuspec) not found")]
    MissingManifest,

    /// The `.nuspec` manifest could not be parsed.
    #[error("invalid package manifest: {0}")]
    InvalidManifest(String),

    /// The package version string is not a valid NuGet version.
    #[error("invalid package version: '{0}'")]
    InvalidVersion(String),

    /// Extracting or inspecting one package entry failed.
    #[error("failed to inspect '{path}': {source}")]
    Inspection {
        /// Package-relative path of the entry.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// An expectation table could not be loaded.
    #[error("invalid expectation table{}: {reason}", describe_source(.path))]
    InvalidExpectation {
        /// Source file of the table, when loaded from disk.
        path: Option<PathBuf>,
        /// What was wrong with it.
        reason: String,
    },
}

fn describe_source(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map_or_else(String::new, |p| format!(" '{}'", p.display()))
}

impl VerifyError {
    /// Returns `true` if the package itself is unusable, as opposed to a
    /// problem with the local environment or the expectation table.
    ///
    /// # Examples
    ///
    /// ```
    /// use nupkg_verify_core::VerifyError;
    ///
    /// assert!(VerifyError::MissingManifest.is_package_defect());
    /// let err = VerifyError::InvalidExpectation { path: None, reason: "empty".into() };
    /// assert!(!err.is_package_defect());
    /// ```
    #[must_use]
    pub const fn is_package_defect(&self) -> bool {
        matches!(
            self,
            Self::InvalidArchive(_)
                | Self::MissingManifest
                | Self::InvalidManifest(_)
                | Self::InvalidVersion(_)
        )
    }
}
