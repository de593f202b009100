//! Package inspection and verification runs.
//!
//! [`inspect_package`] opens a `.nupkg`, checks its package signature and
//! extracts every package file into a [`TemporaryFile`] so the signature
//! inspector can look at it. [`verify_package`] then compares the result
//! with a [`ManifestExpectation`].
//!
//! # Examples
//!
//! ```no_run
//! use nupkg_verify_core::ManifestExpectation;
//! use nupkg_verify_core::NoopProgress;
//! use nupkg_verify_core::signature::AuthenticodeInspector;
//! use nupkg_verify_core::verify_package;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let expectation = ManifestExpectation::msal("2.7.0");
//! let outcome = verify_package(
//!     Path::new("Microsoft.Identity.Client.2.7.0.nupkg"),
//!     &expectation,
//!     &AuthenticodeInspector::new(),
//!     &mut NoopProgress,
//! )?;
//! for result in outcome.report.results() {
//!     println!("{result}");
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::path::PathBuf;

use crate::PackageEntry;
use crate::Result;
use crate::VerifyError;
use crate::archive::NuGetPackage;
use crate::config::ManifestExpectation;
use crate::formats::PackageMetadata;
use crate::io::TemporaryFile;
use crate::signature::PackageSignatureStatus;
use crate::signature::SignatureInspector;
use crate::validation::ValidationReport;
use crate::validation::Validator;

/// Receives progress notifications while package files are inspected.
pub trait InspectionProgress {
    /// Called once the package is open, with the number of files to inspect.
    fn on_start(&mut self, total: usize);

    /// Called before a file is extracted. `current` is 1-indexed.
    fn on_entry_start(&mut self, path: &str, current: usize, total: usize);

    /// Called after a file has been inspected.
    fn on_entry_complete(&mut self, entry: &PackageEntry);

    /// Called when every file has been inspected.
    fn on_complete(&mut self);
}

/// Progress sink that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl InspectionProgress for NoopProgress {
    fn on_start(&mut self, _total: usize) {}

    fn on_entry_start(&mut self, _path: &str, _current: usize, _total: usize) {}

    fn on_entry_complete(&mut self, _entry: &PackageEntry) {}

    fn on_complete(&mut self) {}
}

/// Everything learned about one package.
#[derive(Debug, Clone)]
pub struct PackageInspection {
    /// Path the package was read from.
    pub package_path: PathBuf,
    /// Manifest metadata.
    pub metadata: PackageMetadata,
    /// Outcome of the package signature check.
    pub package_signature: PackageSignatureStatus,
    /// Package files, in archive order.
    pub entries: Vec<PackageEntry>,
}

impl PackageInspection {
    /// Number of `.dll` entries.
    #[must_use]
    pub fn binary_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_binary()).count()
    }

    /// Looks up an entry by its exact package path, the way the validator
    /// resolves existence checks. When a path repeats, the last one wins.
    #[must_use]
    pub fn entry(&self, path: &str) -> Option<&PackageEntry> {
        self.entries.iter().rev().find(|e| e.path() == path)
    }
}

/// Inspection together with its comparison report.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    /// The inspected package.
    pub inspection: PackageInspection,
    /// Per-check results.
    pub report: ValidationReport,
}

impl VerificationOutcome {
    /// Whether every check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.report.passed()
    }
}

/// Opens and inspects a package.
///
/// # Errors
///
/// Fails if the package cannot be opened or its manifest parsed, or if any
/// package file cannot be extracted or read. A failure on one file aborts
/// the whole inspection.
pub fn inspect_package(
    path: &Path,
    inspector: &dyn SignatureInspector,
    progress: &mut dyn InspectionProgress,
) -> Result<PackageInspection> {
    let mut package = NuGetPackage::open(path)?;

    let package_signature = inspector.verify_package(path)?;
    if package_signature.is_signed && !package_signature.is_valid {
        tracing::warn!(
            package = %path.display(),
            verdict = ?package_signature.verdict,
            "package signature is not valid"
        );
    }

    let files = package.files().to_vec();
    let total = files.len();
    progress.on_start(total);

    let mut entries = Vec::with_capacity(total);
    for (index, file) in files.iter().enumerate() {
        progress.on_entry_start(file.path(), index + 1, total);

        let wrap = |source: std::io::Error| VerifyError::Inspection {
            path: file.path().to_string(),
            source,
        };
        let reader = package.open_file(file)?;
        let temp = TemporaryFile::from_reader(reader, file.extension()).map_err(|e| match e {
            VerifyError::Io(source) => wrap(source),
            other => other,
        })?;
        let signatures = inspector.inspect_file(temp.path()).map_err(|e| match e {
            VerifyError::Io(source) => wrap(source),
            other => other,
        })?;

        let entry = PackageEntry::new(
            file.path(),
            signatures.signatures,
            Some(signatures.verdict),
            temp.len(),
        );
        tracing::debug!(
            path = entry.path(),
            size = entry.size(),
            verdict = %signatures.verdict,
            "inspected entry"
        );
        progress.on_entry_complete(&entry);
        entries.push(entry);
    }
    progress.on_complete();

    let metadata = package.into_metadata();
    tracing::info!(
        id = %metadata.id,
        version = %metadata.version,
        entries = entries.len(),
        signed = package_signature.is_signed,
        "inspection complete"
    );

    Ok(PackageInspection {
        package_path: path.to_path_buf(),
        metadata,
        package_signature,
        entries,
    })
}

/// Inspects a package and compares it with `expectation`.
///
/// # Errors
///
/// Same as [`inspect_package`]. Mismatches are reported in the outcome,
/// never as errors.
pub fn verify_package(
    path: &Path,
    expectation: &ManifestExpectation,
    inspector: &dyn SignatureInspector,
    progress: &mut dyn InspectionProgress,
) -> Result<VerificationOutcome> {
    let inspection = inspect_package(path, inspector, progress)?;
    let report = Validator::new(expectation).validate(&inspection);
    tracing::info!(
        checks = report.total(),
        failed = report.failed_count(),
        "verification complete"
    );
    Ok(VerificationOutcome { inspection, report })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::SignatureVerdict;
    use crate::signature::AuthenticodeInspector;
    use crate::signature::FileSignatures;
    use crate::test_utils::NupkgBuilder;
    use crate::test_utils::signing::signed_pe;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl InspectionProgress for Recorder {
        fn on_start(&mut self, total: usize) {
            self.events.push(format!("start {total}"));
        }

        fn on_entry_start(&mut self, path: &str, current: usize, total: usize) {
            self.events.push(format!("begin {current}/{total} {path}"));
        }

        fn on_entry_complete(&mut self, entry: &PackageEntry) {
            self.events.push(format!("done {}", entry.path()));
        }

        fn on_complete(&mut self) {
            self.events.push("complete".to_string());
        }
    }

    /// Records the files it was handed and reports every one as valid.
    #[derive(Default)]
    struct SpyInspector {
        seen: RefCell<Vec<(PathBuf, Vec<u8>)>>,
    }

    impl SignatureInspector for SpyInspector {
        fn inspect_file(&self, path: &Path) -> Result<FileSignatures> {
            let data = std::fs::read(path)?;
            self.seen.borrow_mut().push((path.to_path_buf(), data));
            Ok(FileSignatures::unsigned(SignatureVerdict::Valid))
        }

        fn verify_package(&self, _path: &Path) -> Result<PackageSignatureStatus> {
            Ok(PackageSignatureStatus::unsigned())
        }
    }

    struct FailingInspector;

    impl SignatureInspector for FailingInspector {
        fn inspect_file(&self, _path: &Path) -> Result<FileSignatures> {
            Err(std::io::Error::other("device unplugged").into())
        }

        fn verify_package(&self, _path: &Path) -> Result<PackageSignatureStatus> {
            Ok(PackageSignatureStatus::unsigned())
        }
    }

    #[test]
    fn test_entries_follow_archive_order() {
        let temp = TempDir::new().unwrap();
        let path = NupkgBuilder::new("Demo", "1.0.0")
            .add_file("lib/net45/Demo.xml", b"<doc/>")
            .add_file("lib/net45/Demo.dll", &signed_pe("CN=Demo"))
            .add_file("content/readme.txt", b"hi")
            .write_to(temp.path());

        let inspection =
            inspect_package(&path, &AuthenticodeInspector::new(), &mut NoopProgress).unwrap();

        let paths: Vec<_> = inspection.entries.iter().map(PackageEntry::path).collect();
        assert_eq!(
            paths,
            vec![r"lib\net45\Demo.xml", r"lib\net45\Demo.dll", r"content\readme.txt"]
        );
        assert_eq!(inspection.binary_count(), 1);
        assert_eq!(inspection.metadata.id, "Demo");
        assert_eq!(inspection.package_path, path);
        assert!(!inspection.package_signature.is_signed);

        let dll = inspection.entry(r"lib\net45\Demo.dll").unwrap();
        assert_eq!(dll.verdict(), Some(SignatureVerdict::Valid));
        assert!(inspection.entry(r"LIB\NET45\demo.DLL").is_none());
        assert_eq!(dll.signatures().len(), 1);
        let xml = inspection.entry(r"lib\net45\Demo.xml").unwrap();
        assert_eq!(xml.verdict(), Some(SignatureVerdict::UnknownSubject));
        assert_eq!(xml.size(), 6);
    }

    #[test]
    fn test_temp_files_carry_extension_and_are_removed() {
        let temp = TempDir::new().unwrap();
        let path = NupkgBuilder::new("Demo", "1.0.0")
            .add_file("lib/net45/Demo.dll", b"MZ-not-really")
            .add_file("lib/uap10.0/Demo.pri", b"pri")
            .write_to(temp.path());

        let spy = SpyInspector::default();
        inspect_package(&path, &spy, &mut NoopProgress).unwrap();

        let seen = spy.seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].0.to_string_lossy().ends_with(".dll"));
        assert_eq!(seen[0].1, b"MZ-not-really");
        assert!(seen[1].0.to_string_lossy().ends_with(".pri"));
        for (temp_path, _) in seen.iter() {
            assert!(!temp_path.exists());
        }
    }

    #[test]
    fn test_progress_notifications() {
        let temp = TempDir::new().unwrap();
        let path = NupkgBuilder::new("Demo", "1.0.0")
            .add_file("a.txt", b"a")
            .add_file("b.txt", b"b")
            .write_to(temp.path());

        let mut recorder = Recorder::default();
        inspect_package(&path, &SpyInspector::default(), &mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            vec![
                "start 2",
                "begin 1/2 a.txt",
                "done a.txt",
                "begin 2/2 b.txt",
                "done b.txt",
                "complete",
            ]
        );
    }

    #[test]
    fn test_inspector_failure_aborts_with_entry_path() {
        let temp = TempDir::new().unwrap();
        let path = NupkgBuilder::new("Demo", "1.0.0")
            .add_file("lib/net45/Demo.dll", b"MZ")
            .write_to(temp.path());

        let err = inspect_package(&path, &FailingInspector, &mut NoopProgress).unwrap_err();
        match err {
            VerifyError::Inspection { path, source } => {
                assert_eq!(path, r"lib\net45\Demo.dll");
                assert!(source.to_string().contains("device unplugged"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_signed_package_status() {
        let temp = TempDir::new().unwrap();
        let path = NupkgBuilder::new("Demo", "1.0.0")
            .add_file("content/readme.txt", b"hi")
            .signed(Some(crate::test_utils::signing::test_certificate("CN=Demo")))
            .write_to(temp.path());

        let inspection =
            inspect_package(&path, &AuthenticodeInspector::new(), &mut NoopProgress).unwrap();
        assert!(inspection.package_signature.is_signed);
        assert!(inspection.package_signature.is_valid);
        assert_eq!(inspection.entries.len(), 1);
    }

    #[test]
    fn test_verify_package_reports_mismatches() {
        let temp = TempDir::new().unwrap();
        let path = NupkgBuilder::new("Demo", "1.0.0").write_to(temp.path());

        let outcome = verify_package(
            &path,
            &ManifestExpectation::msal("1.0.0"),
            &AuthenticodeInspector::new(),
            &mut NoopProgress,
        )
        .unwrap();
        assert!(!outcome.passed());
        assert!(outcome.report.failed_count() > 0);
        assert!(outcome.inspection.entries.is_empty());
    }

    #[test]
    fn test_unreadable_package_is_error() {
        let result = inspect_package(
            Path::new("/nonexistent/Demo.1.0.0.nupkg"),
            &AuthenticodeInspector::new(),
            &mut NoopProgress,
        );
        assert!(matches!(result, Err(VerifyError::Io(_))));
    }
}
