//! The seam between a finished verification and stdout.

use anyhow::Result;
use nupkg_verify_core::VerificationOutcome;
use serde::Serialize;
use std::path::Path;

/// Prints one verification run: the loading banner, then either the
/// outcome or the fatal error that stopped it.
pub trait ReportPrinter {
    fn loading(&self, package: &Path);

    /// Writes the check results, in report order.
    fn outcome(&self, outcome: &VerificationOutcome) -> Result<()>;

    /// Reports a fatal error. Nothing else is printed for the run.
    fn fatal(&self, error: &anyhow::Error);

    /// `false` when stdout carries machine-readable output that a progress
    /// bar would corrupt.
    fn shows_progress(&self) -> bool;
}

/// Overall result of a run as reported in `--json` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every check passed.
    Passed,
    /// At least one check failed.
    Failed,
    /// The package or the expectation table could not be processed.
    Error,
}

/// Top-level `--json` document. Exactly one of `report` and `error` is set.
#[derive(Debug, Serialize)]
pub struct JsonEnvelope<T> {
    pub operation: &'static str,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

const OPERATION: &str = "verify";

impl<T: Serialize> JsonEnvelope<T> {
    pub fn report(passed: bool, data: T) -> Self {
        let status = if passed { RunStatus::Passed } else { RunStatus::Failed };
        Self {
            operation: OPERATION,
            status,
            data: Some(data),
            error: None,
        }
    }
}

impl JsonEnvelope<()> {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            operation: OPERATION,
            status: RunStatus::Error,
            data: None,
            error: Some(message.into()),
        }
    }
}
