//! `--json` report, a single document on stdout.

use super::report::JsonEnvelope;
use super::report::ReportPrinter;
use anyhow::Result;
use nupkg_verify_core::PackageSignatureStatus;
use nupkg_verify_core::SignatureRecord;
use nupkg_verify_core::SignatureVerdict;
use nupkg_verify_core::ValidationResult;
use nupkg_verify_core::VerificationOutcome;
use serde::Serialize;
use std::io::Write;
use std::io::{self};
use std::path::Path;

pub struct JsonPrinter;

#[derive(Serialize)]
struct EntryOutput<'a> {
    path: &'a str,
    size: u64,
    binary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    verdict: Option<SignatureVerdict>,
    signatures: &'a [SignatureRecord],
}

#[derive(Serialize)]
struct VerificationOutput<'a> {
    package: String,
    id: &'a str,
    version: String,
    passed: bool,
    total: usize,
    failed: usize,
    package_signature: &'a PackageSignatureStatus,
    results: &'a [ValidationResult],
    entries: Vec<EntryOutput<'a>>,
}

impl JsonPrinter {
    fn print<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }

    fn envelope(outcome: &VerificationOutcome) -> JsonEnvelope<VerificationOutput<'_>> {
        let inspection = &outcome.inspection;
        let report = &outcome.report;
        let data = VerificationOutput {
            package: inspection.package_path.display().to_string(),
            id: &inspection.metadata.id,
            version: inspection.metadata.version.to_string(),
            passed: report.passed(),
            total: report.total(),
            failed: report.failed_count(),
            package_signature: &inspection.package_signature,
            results: report.results(),
            entries: inspection
                .entries
                .iter()
                .map(|entry| EntryOutput {
                    path: entry.path(),
                    size: entry.size(),
                    binary: entry.is_binary(),
                    verdict: entry.verdict().filter(|_| entry.is_binary()),
                    signatures: entry.signatures(),
                })
                .collect(),
        };
        JsonEnvelope::report(report.passed(), data)
    }
}

impl ReportPrinter for JsonPrinter {
    fn loading(&self, _package: &Path) {}

    fn outcome(&self, outcome: &VerificationOutcome) -> Result<()> {
        Self::print(&Self::envelope(outcome))
    }

    fn fatal(&self, error: &anyhow::Error) {
        if let Err(print_error) = Self::print(&JsonEnvelope::fatal(format!("{error:#}"))) {
            tracing::error!(%print_error, %error, "cannot write the JSON error document");
        }
    }

    fn shows_progress(&self) -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nupkg_verify_core::ManifestExpectation;
    use nupkg_verify_core::PackageEntry;
    use nupkg_verify_core::PackageInspection;
    use nupkg_verify_core::Validator;
    use nupkg_verify_core::formats::parse_nuspec;
    use std::path::PathBuf;

    fn outcome() -> VerificationOutcome {
        let metadata = parse_nuspec(
            "<package><metadata><id>Demo</id><version>1.0.0</version></metadata></package>",
        )
        .unwrap();
        let inspection = PackageInspection {
            package_path: PathBuf::from("Demo.1.0.0.nupkg"),
            metadata,
            package_signature: PackageSignatureStatus::unsigned(),
            entries: vec![
                PackageEntry::new(
                    r"lib\net45\Demo.dll",
                    Vec::new(),
                    Some(SignatureVerdict::Valid),
                    64,
                ),
                PackageEntry::new(
                    "readme.txt",
                    Vec::new(),
                    Some(SignatureVerdict::UnknownSubject),
                    3,
                ),
            ],
        };
        let report = Validator::new(&ManifestExpectation::msal("1.0.0")).validate(&inspection);
        VerificationOutcome { inspection, report }
    }

    #[test]
    fn test_verification_output_structure() {
        let outcome = outcome();
        let json = serde_json::to_value(JsonPrinter::envelope(&outcome)).unwrap();

        assert_eq!(json["operation"], "verify");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["data"]["id"], "Demo");
        assert_eq!(json["data"]["passed"], false);
        assert_eq!(json["data"]["total"], outcome.report.total());
        assert_eq!(json["data"]["results"][0]["label"], "Title");
        assert_eq!(json["data"]["entries"][0]["verdict"], "Valid");
        assert_eq!(json["data"]["entries"][0]["binary"], true);
        assert!(json["data"]["entries"][1].get("verdict").is_none());
        assert_eq!(json["data"]["package_signature"]["is_signed"], false);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_error_output_structure() {
        let output = JsonEnvelope::fatal("boom");
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["operation"], "verify");
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
        assert!(json.get("data").is_none());
    }
}
