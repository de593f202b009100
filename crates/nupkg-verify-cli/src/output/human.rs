//! Plain-text report: one `Label: OK` or `Label: FAIL!` line per check,
//! a summary, and with `--verbose` a dump of everything that was inspected.

use super::report::ReportPrinter;
use anyhow::Result;
use console::Term;
use console::style;
use nupkg_verify_core::PackageInspection;
use nupkg_verify_core::ValidationResult;
use nupkg_verify_core::VerificationOutcome;
use std::path::Path;

pub struct TextPrinter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
}

impl TextPrinter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
        }
    }

    fn result_line(&self, result: &ValidationResult) -> String {
        if !self.use_colors {
            return result.to_string();
        }
        if result.passed {
            format!("{}: {}", result.label, style("OK").green())
        } else {
            format!(
                "{}: {} expected({}) actual({})",
                result.label,
                style("FAIL!").red().bold(),
                result.expected,
                result.actual
            )
        }
    }

    fn summary_line(&self, outcome: &VerificationOutcome) -> String {
        let report = &outcome.report;
        let (mark, text) = if report.passed() {
            ("✓", format!("All {} checks passed", report.total()))
        } else {
            (
                "✗",
                format!("{} of {} checks failed", report.failed_count(), report.total()),
            )
        };
        if !self.use_colors {
            return text;
        }
        if report.passed() {
            format!("{} {text}", style(mark).green().bold())
        } else {
            format!("{} {text}", style(mark).red().bold())
        }
    }
}

/// Renders a flag the way the package tooling prints it.
fn flag(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn text(value: Option<&str>) -> &str {
    value.unwrap_or_default()
}

/// Full metadata and file dump printed after the report with `--verbose`.
fn verbose_lines(inspection: &PackageInspection) -> Vec<String> {
    let m = &inspection.metadata;
    let signature = &inspection.package_signature;
    let publisher = signature
        .signatures
        .first()
        .map(ToString::to_string)
        .unwrap_or_default();

    let mut lines = vec![
        "Verbose Output...".to_string(),
        String::new(),
        format!("Authors: {}", m.authors_joined()),
        format!("Copyright: {}", text(m.copyright.as_deref())),
        format!("Description: {}", text(m.description.as_deref())),
        format!("DevelopmentDependency: {}", flag(m.development_dependency)),
        format!("FullName: {}", m.full_name()),
        format!("IconUrl: {}", text(m.icon_url.as_deref())),
        format!("Id: {}", m.id),
        format!("IsPrerelease: {}", flag(m.is_prerelease())),
        format!("IsReleaseVersion: {}", flag(m.is_release_version())),
        format!("Language: {}", text(m.language.as_deref())),
        format!(
            "License: {}",
            m.license.as_ref().map(ToString::to_string).unwrap_or_default()
        ),
        format!("LicenseUrl: {}", text(m.license_url.as_deref())),
        format!("MinClientVersion: {}", text(m.min_client_version.as_deref())),
        format!("Owners: {}", m.owners.join(",")),
        format!("PackageAssemblyReferences: {}", m.references.join(",")),
        format!("PackageTypes: {}", m.package_types.join(",")),
        format!("ProjectUrl: {}", text(m.project_url.as_deref())),
        format!("PublisherSignature: {publisher}"),
        format!("ReleaseNotes: {}", text(m.release_notes.as_deref())),
        format!("ReportAbuseUrl: {}", text(m.report_abuse_url.as_deref())),
        format!(
            "Repository: {}",
            m.repository
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default()
        ),
        format!("RequireLicenseAcceptance: {}", flag(m.require_license_acceptance)),
        format!("Serviceable: {}", flag(m.serviceable)),
        format!("Source: {}", inspection.package_path.display()),
        format!("Summary: {}", text(m.summary.as_deref())),
        format!("Tags: {}", m.tags().unwrap_or_default()),
        format!(
            "Signature Verification Result (signed): {}",
            flag(signature.is_signed)
        ),
        format!(
            "Signature Verification Result (valid): {}",
            flag(signature.is_valid)
        ),
        String::new(),
        format!("Title: {}", text(m.title.as_deref())),
        format!("Version: {}", m.version),
    ];
    lines.extend(inspection.entries.iter().map(ToString::to_string));
    lines
}

impl ReportPrinter for TextPrinter {
    fn loading(&self, package: &Path) {
        if self.quiet {
            return;
        }
        let _ = self
            .term
            .write_line(&format!("Loading {}", package.display()));
    }

    fn outcome(&self, outcome: &VerificationOutcome) -> Result<()> {
        for result in outcome.report.results() {
            if self.quiet && result.passed {
                continue;
            }
            self.term.write_line(&self.result_line(result))?;
        }

        if !self.quiet || !outcome.passed() {
            self.term.write_line("")?;
            self.term.write_line(&self.summary_line(outcome))?;
        }

        if self.verbose {
            self.term.write_line("")?;
            for line in verbose_lines(&outcome.inspection) {
                self.term.write_line(&line)?;
            }
        }

        Ok(())
    }

    fn fatal(&self, error: &anyhow::Error) {
        let term = Term::stderr();
        if self.use_colors {
            let _ = term.write_line(&format!("{} {error:#}", style("error:").red().bold()));
        } else {
            let _ = term.write_line(&format!("error: {error:#}"));
        }
    }

    fn shows_progress(&self) -> bool {
        !self.quiet
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nupkg_verify_core::PackageEntry;
    use nupkg_verify_core::PackageSignatureStatus;
    use nupkg_verify_core::SignatureVerdict;
    use nupkg_verify_core::formats::parse_nuspec;
    use std::path::PathBuf;

    fn plain(verbose: bool, quiet: bool) -> TextPrinter {
        TextPrinter {
            verbose,
            quiet,
            use_colors: false,
            term: Term::stdout(),
        }
    }

    fn inspection() -> PackageInspection {
        let metadata = parse_nuspec(
            "<package><metadata><id>Demo</id><version>1.0.0</version>\
             <authors>Alice, Bob</authors><requireLicenseAcceptance>true</requireLicenseAcceptance>\
             <tags>a  b</tags></metadata></package>",
        )
        .unwrap();
        PackageInspection {
            package_path: PathBuf::from("Demo.1.0.0.nupkg"),
            metadata,
            package_signature: PackageSignatureStatus::unsigned(),
            entries: vec![
                PackageEntry::new(
                    r"lib\net45\Demo.dll",
                    Vec::new(),
                    Some(SignatureVerdict::NoSignature),
                    64,
                ),
                PackageEntry::new(
                    r"lib\net45\Demo.xml",
                    Vec::new(),
                    Some(SignatureVerdict::UnknownSubject),
                    6,
                ),
            ],
        }
    }

    #[test]
    fn test_result_lines_without_colors() {
        let printer = plain(false, false);
        let ok = ValidationResult {
            label: "Title".into(),
            passed: true,
            expected: "A".into(),
            actual: "a".into(),
        };
        let fail = ValidationResult {
            label: "Number of Dlls".into(),
            passed: false,
            expected: "12".into(),
            actual: "11".into(),
        };
        assert_eq!(printer.result_line(&ok), "Title: OK");
        assert_eq!(
            printer.result_line(&fail),
            "Number of Dlls: FAIL! expected(12) actual(11)"
        );
    }

    #[test]
    fn test_verbose_dump_fields() {
        let lines = verbose_lines(&inspection());
        assert_eq!(lines[0], "Verbose Output...");
        assert!(lines.contains(&"Authors: Alice,Bob".to_string()));
        assert!(lines.contains(&"FullName: Demo 1.0.0".to_string()));
        assert!(lines.contains(&"IconUrl: ".to_string()));
        assert!(lines.contains(&"RequireLicenseAcceptance: True".to_string()));
        assert!(lines.contains(&"Serviceable: False".to_string()));
        assert!(lines.contains(&"Tags:  a b ".to_string()));
        assert!(lines.contains(&"Signature Verification Result (signed): False".to_string()));
        assert_eq!(
            lines[lines.len() - 2],
            r"Name: (lib\net45\Demo.dll) IsValidSig: NoSignature  FileSize(64)"
        );
        assert_eq!(
            lines[lines.len() - 1],
            r"Name: (lib\net45\Demo.xml) IsValidSig: N/A  FileSize(6)"
        );
    }

    #[test]
    fn test_flag_rendering() {
        assert_eq!(flag(true), "True");
        assert_eq!(flag(false), "False");
    }

    #[test]
    fn test_quiet_hides_progress() {
        assert!(!plain(false, true).shows_progress());
        assert!(plain(true, false).shows_progress());
    }
}
