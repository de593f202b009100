//! Comparison engine.
//!
//! Every check produces exactly one [`ValidationResult`]; mismatches are
//! data, never errors. Checks run in a fixed order so two runs over the
//! same inputs yield identical reports:
//!
//! 1. metadata fields, in table order;
//! 2. total, binary and non-binary file counts;
//! 3. per platform: `lib dll`, `lib xml`, `ref dll`, `ref xml`;
//! 4. extra files.
//!
//! Each expected file gets an `Exists` check. A present binary also gets a
//! `Signed` check expecting [`SignatureVerdict::Valid`].

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::config::FileCheck;
use crate::config::ManifestExpectation;
use crate::entry::PackageEntry;
use crate::inspection::PackageInspection;
use crate::signature::SignatureVerdict;

/// A value that can be expected of, or observed on, a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Text, possibly absent. Absent renders as the empty string.
    Text(Option<String>),
    /// Boolean flag.
    Flag(bool),
    /// Count of files.
    Count(usize),
    /// Signature verdict.
    Verdict(SignatureVerdict),
}

impl FieldValue {
    /// Text value from a string slice.
    #[must_use]
    pub fn text(value: Option<&str>) -> Self {
        Self::Text(value.map(str::to_string))
    }

    /// Comparator used when a check does not name one: case-insensitive for
    /// text, exact for everything else.
    #[must_use]
    pub const fn default_comparator(&self) -> Comparator {
        match self {
            Self::Text(_) => Comparator::IgnoreCase,
            Self::Flag(_) | Self::Count(_) | Self::Verdict(_) => Comparator::Exact,
        }
    }

    /// Compares two values. Values of different kinds never match.
    #[must_use]
    pub fn matches(&self, other: &Self, comparator: Comparator) -> bool {
        match (self, other) {
            (Self::Text(expected), Self::Text(actual)) => match comparator {
                Comparator::Exact => expected == actual,
                Comparator::IgnoreCase => match (expected, actual) {
                    (Some(expected), Some(actual)) => eq_ignore_case(expected, actual),
                    (None, None) => true,
                    _ => false,
                },
            },
            (Self::Flag(expected), Self::Flag(actual)) => expected == actual,
            (Self::Count(expected), Self::Count(actual)) => expected == actual,
            (Self::Verdict(expected), Self::Verdict(actual)) => expected == actual,
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => f.write_str(value.as_deref().unwrap_or_default()),
            Self::Flag(true) => f.write_str("True"),
            Self::Flag(false) => f.write_str("False"),
            Self::Count(count) => write!(f, "{count}"),
            Self::Verdict(verdict) => write!(f, "{verdict}"),
        }
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// How two values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparator {
    /// Text equal up to letter case; absent equals only absent.
    IgnoreCase,
    /// Exact equality.
    Exact,
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// Check label, e.g. `net45 - lib dll Exists`.
    pub label: String,
    /// Whether expected and actual matched.
    pub passed: bool,
    /// Expected value as rendered for humans.
    pub expected: String,
    /// Actual value as rendered for humans.
    pub actual: String,
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            write!(f, "{}: OK", self.label)
        } else {
            write!(
                f,
                "{}: FAIL! expected({}) actual({})",
                self.label, self.expected, self.actual
            )
        }
    }
}

/// Runs one check.
///
/// Works for any displayable value with an explicit equality function, so
/// callers are not limited to [`FieldValue`].
///
/// # Examples
///
/// ```
/// use nupkg_verify_core::validation::compare;
///
/// let result = compare("Id", "Microsoft.Identity.Client", "microsoft.identity.client", |a, b| {
///     a.eq_ignore_ascii_case(b)
/// });
/// assert!(result.passed);
///
/// let result = compare("Number of Dlls", &12, &11, |a, b| a == b);
/// assert_eq!(result.to_string(), "Number of Dlls: FAIL! expected(12) actual(11)");
/// ```
pub fn compare<T>(
    label: impl Into<String>,
    expected: &T,
    actual: &T,
    equal: impl FnOnce(&T, &T) -> bool,
) -> ValidationResult
where
    T: fmt::Display + ?Sized,
{
    ValidationResult {
        label: label.into(),
        passed: equal(expected, actual),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

/// Ordered results of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    results: Vec<ValidationResult>,
}

impl ValidationReport {
    /// All results in check order.
    #[must_use]
    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    /// Failed results in check order.
    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|result| !result.passed)
    }

    /// Whether every check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(|result| result.passed)
    }

    /// Number of checks run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Number of failed checks.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    fn push(&mut self, result: ValidationResult) {
        tracing::debug!(label = %result.label, passed = result.passed, "check");
        self.results.push(result);
    }
}

/// Compares a [`PackageInspection`] against a [`ManifestExpectation`].
///
/// # Examples
///
/// ```no_run
/// use nupkg_verify_core::ManifestExpectation;
/// use nupkg_verify_core::Validator;
/// use nupkg_verify_core::inspect_package;
/// use nupkg_verify_core::inspection::NoopProgress;
/// use nupkg_verify_core::signature::AuthenticodeInspector;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let inspection = inspect_package(
///     "Microsoft.Identity.Client.2.7.0.nupkg".as_ref(),
///     &AuthenticodeInspector::new(),
///     &mut NoopProgress,
/// )?;
/// let expectation = ManifestExpectation::msal("2.7.0");
/// let report = Validator::new(&expectation).validate(&inspection);
/// println!("{} of {} checks failed", report.failed_count(), report.total());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    expectation: &'a ManifestExpectation,
}

impl<'a> Validator<'a> {
    /// Creates a validator for the given expectation table.
    #[must_use]
    pub const fn new(expectation: &'a ManifestExpectation) -> Self {
        Self { expectation }
    }

    /// Runs every check. Never fails and never modifies its inputs.
    #[must_use]
    pub fn validate(&self, inspection: &PackageInspection) -> ValidationReport {
        let mut report = ValidationReport::default();

        for field in &self.expectation.metadata {
            let actual = field.field.actual(inspection);
            let comparator = field
                .comparator
                .unwrap_or_else(|| field.expected.default_comparator());
            report.push(compare(
                field.field.label(),
                &field.expected,
                &actual,
                |expected, actual| expected.matches(actual, comparator),
            ));
        }

        // Keyed by exact path; a duplicated path keeps its last entry.
        let files: BTreeMap<&str, &PackageEntry> = inspection
            .entries
            .iter()
            .map(|entry| (entry.path(), entry))
            .collect();

        let total = files.len();
        let binaries = files.values().filter(|entry| entry.is_binary()).count();
        let counts = &self.expectation.file_counts;
        for (label, expected, actual) in [
            ("Number of Total Files", counts.total, total),
            ("Number of Dlls", counts.binaries, binaries),
            ("Number of Non-Dlls", counts.non_binaries, total - binaries),
        ] {
            report.push(compare(label, &expected, &actual, |a, b| a == b));
        }

        for check in self.expectation.inventory.checks() {
            check_file(&mut report, &files, &check);
        }

        report
    }
}

fn check_file(
    report: &mut ValidationReport,
    files: &BTreeMap<&str, &PackageEntry>,
    check: &FileCheck,
) {
    let entry = files.get(check.path.as_str());
    report.push(compare(
        format!("{} Exists", check.label),
        &FieldValue::Flag(true),
        &FieldValue::Flag(entry.is_some()),
        |expected, actual| expected.matches(actual, Comparator::Exact),
    ));

    if let Some(entry) = entry
        && check.binary
    {
        let actual = entry
            .verdict()
            .map_or(FieldValue::Text(None), FieldValue::Verdict);
        report.push(compare(
            format!("{} Signed", check.label),
            &FieldValue::Verdict(SignatureVerdict::Valid),
            &actual,
            |expected, actual| expected.matches(actual, Comparator::Exact),
        ));
    }
}
