//! End-to-end verification of generated release packages.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;

use nupkg_verify_core::config::FieldExpectation;
use nupkg_verify_core::FieldValue;
use nupkg_verify_core::ManifestExpectation;
use nupkg_verify_core::MetadataField;
use nupkg_verify_core::NoopProgress;
use nupkg_verify_core::SignatureVerdict;
use nupkg_verify_core::VerificationOutcome;
use nupkg_verify_core::VerifyError;
use nupkg_verify_core::signature::AuthenticodeInspector;
use nupkg_verify_core::test_utils::NupkgBuilder;
use nupkg_verify_core::test_utils::pe_image;
use nupkg_verify_core::test_utils::signing::signed_pe;
use nupkg_verify_core::test_utils::signing::test_certificate;
use nupkg_verify_core::verify_package;
use tempfile::TempDir;

const ASSEMBLY: &str = "Microsoft.Identity.Client";
const PLATFORMS: [&str; 6] = [
    "monoandroid81",
    "net45",
    "netcoreapp1.0",
    "netstandard1.3",
    "uap10.0",
    "xamarinios10",
];
/// Stable release; the build metadata does not make it a prerelease.
const VERSION: &str = "2.7.0+build.42";

/// The built-in MSAL table expects `IsPrerelease` and `IsReleaseVersion` to
/// both be false, which no version satisfies. Release packages are checked
/// against a copy that expects a release version.
fn release_expectation(version: &str) -> ManifestExpectation {
    let mut table = ManifestExpectation::msal(version);
    for entry in &mut table.metadata {
        if entry.field == MetadataField::IsReleaseVersion {
            *entry = FieldExpectation::flag(MetadataField::IsReleaseVersion, true);
        }
    }
    table
}

fn expected_text(expectation: &ManifestExpectation, field: MetadataField) -> String {
    let entry = expectation
        .metadata
        .iter()
        .find(|f| f.field == field)
        .expect("field in table");
    match &entry.expected {
        FieldValue::Text(Some(text)) => text.clone(),
        other => panic!("{field} is not a text expectation: {other:?}"),
    }
}

/// A package matching the built-in MSAL table in every respect.
fn msal_package() -> NupkgBuilder {
    let table = ManifestExpectation::msal(VERSION);
    let mut builder = NupkgBuilder::new(ASSEMBLY, VERSION);
    for (element, field) in [
        ("title", MetadataField::Title),
        ("authors", MetadataField::Authors),
        ("copyright", MetadataField::Copyright),
        ("description", MetadataField::Description),
        ("licenseUrl", MetadataField::LicenseUrl),
        ("projectUrl", MetadataField::ProjectUrl),
        ("tags", MetadataField::Tags),
    ] {
        builder = builder.metadata(element, &expected_text(&table, field));
    }
    builder = builder.metadata("requireLicenseAcceptance", "true");

    let dll = signed_pe("CN=Microsoft Corporation");
    for platform in PLATFORMS {
        for folder in ["lib", "ref"] {
            builder = builder
                .add_file(&format!("{folder}/{platform}/{ASSEMBLY}.dll"), &dll)
                .add_file(&format!("{folder}/{platform}/{ASSEMBLY}.xml"), b"<doc/>");
        }
    }
    builder
        .add_file(&format!("lib/uap10.0/{ASSEMBLY}.pri"), b"PRI")
        .signed(Some(test_certificate("CN=Microsoft Corporation")))
}

fn run(builder: &NupkgBuilder) -> (TempDir, PathBuf, VerificationOutcome) {
    let temp = TempDir::new().unwrap();
    let path = builder.write_to(temp.path());
    let outcome = verify_package(
        &path,
        &release_expectation(VERSION),
        &AuthenticodeInspector::new(),
        &mut NoopProgress,
    )
    .unwrap();
    (temp, path, outcome)
}

fn failed_labels(outcome: &VerificationOutcome) -> Vec<String> {
    outcome
        .report
        .failures()
        .map(|r| r.label.clone())
        .collect()
}

#[test]
fn test_perfect_package_has_no_failures() {
    let (_temp, _path, outcome) = run(&msal_package());

    assert_eq!(failed_labels(&outcome), Vec::<String>::new());
    assert!(outcome.passed());
    // 20 metadata fields, 3 counts, 25 existence checks, 12 signature checks.
    assert_eq!(outcome.report.total(), 60);
    assert_eq!(outcome.inspection.entries.len(), 25);
    assert_eq!(outcome.inspection.binary_count(), 12);
}

#[test]
fn test_report_order_is_metadata_counts_then_files() {
    let (_temp, _path, outcome) = run(&msal_package());
    let labels: Vec<&str> = outcome
        .report
        .results()
        .iter()
        .map(|r| r.label.as_str())
        .collect();

    assert_eq!(labels[0], "Title");
    assert_eq!(labels[18], "Is Signed");
    assert_eq!(labels[19], "Is Signature Valid");
    assert_eq!(
        &labels[20..23],
        ["Number of Total Files", "Number of Dlls", "Number of Non-Dlls"]
    );
    assert_eq!(
        &labels[23..27],
        [
            "monoandroid81 - lib dll Exists",
            "monoandroid81 - lib dll Signed",
            "monoandroid81 - lib xml Exists",
            "monoandroid81 - ref dll Exists",
        ]
    );
    assert_eq!(labels.last(), Some(&"uap10.0 - lib pri Exists"));
}

#[test]
fn test_missing_reference_assembly_fails_only_its_existence_check() {
    // An unrelated assembly takes its place so the counts still hold.
    let builder = msal_package()
        .without_file(&format!("ref/net45/{ASSEMBLY}.dll"))
        .add_file("ref/net45/Unrelated.dll", &signed_pe("CN=Other"));

    let (_temp, _path, outcome) = run(&builder);
    assert_eq!(failed_labels(&outcome), vec!["net45 - ref dll Exists"]);
    assert!(
        !outcome
            .report
            .results()
            .iter()
            .any(|r| r.label == "net45 - ref dll Signed")
    );
}

#[test]
fn test_removed_assembly_also_changes_counts() {
    let builder = msal_package().without_file(&format!("ref/net45/{ASSEMBLY}.dll"));

    let (_temp, _path, outcome) = run(&builder);
    assert_eq!(
        failed_labels(&outcome),
        vec![
            "Number of Total Files",
            "Number of Dlls",
            "net45 - ref dll Exists",
        ]
    );
    let total = &outcome.report.results()[20];
    assert_eq!(total.expected, "25");
    assert_eq!(total.actual, "24");
}

#[test]
fn test_unsigned_binary_fails_only_its_signed_check() {
    let path = format!("lib/net45/{ASSEMBLY}.dll");
    let builder = msal_package()
        .without_file(&path)
        .add_file(&path, &pe_image(false));

    let (_temp, _path, outcome) = run(&builder);
    let failures: Vec<_> = outcome.report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].label, "net45 - lib dll Signed");
    assert_eq!(failures[0].expected, "Valid");
    assert_eq!(failures[0].actual, SignatureVerdict::NoSignature.to_string());
    assert!(
        outcome
            .report
            .results()
            .iter()
            .any(|r| r.label == "net45 - lib dll Exists" && r.passed)
    );
}

#[test]
fn test_unsigned_package_fails_signature_fields() {
    let builder = msal_package().without_signature();
    let (_temp, _path, outcome) = run(&builder);
    assert_eq!(
        failed_labels(&outcome),
        vec!["Is Signed", "Is Signature Valid"]
    );
}

#[test]
fn test_tampered_package_signature_is_invalid() {
    let builder = msal_package().signature_blob(b"not a signature".to_vec());
    let (_temp, _path, outcome) = run(&builder);
    assert_eq!(failed_labels(&outcome), vec!["Is Signature Valid"]);
    assert!(outcome.inspection.package_signature.is_signed);
}

#[test]
fn test_version_mismatch_is_reported_not_raised() {
    let temp = TempDir::new().unwrap();
    let path = msal_package().write_to(temp.path());
    let outcome = verify_package(
        &path,
        &release_expectation("3.0.0"),
        &AuthenticodeInspector::new(),
        &mut NoopProgress,
    )
    .unwrap();
    assert_eq!(failed_labels(&outcome), vec!["Version", "FullName"]);
}

#[test]
fn test_text_fields_ignore_case() {
    let builder = msal_package()
        .metadata("authors", "MICROSOFT")
        .metadata("title", "microsoft authentication library for .net");
    let (_temp, _path, outcome) = run(&builder);
    assert!(outcome.passed(), "{:?}", failed_labels(&outcome));
}

#[test]
fn test_prerelease_version_fails_prerelease_field() {
    let version = "2.7.0-preview";
    let builder = msal_package().version(version);
    let temp = TempDir::new().unwrap();
    let path = builder.write_to(temp.path());
    let outcome = verify_package(
        &path,
        &release_expectation(version),
        &AuthenticodeInspector::new(),
        &mut NoopProgress,
    )
    .unwrap();
    assert_eq!(failed_labels(&outcome), vec!["IsPrerelease", "IsReleaseVersion"]);
}

#[test]
fn test_builtin_table_rejects_release_version() {
    let temp = TempDir::new().unwrap();
    let path = msal_package().write_to(temp.path());
    let outcome = verify_package(
        &path,
        &ManifestExpectation::msal(VERSION),
        &AuthenticodeInspector::new(),
        &mut NoopProgress,
    )
    .unwrap();
    assert_eq!(failed_labels(&outcome), vec!["IsReleaseVersion"]);
}

#[test]
fn test_verification_is_repeatable() {
    let temp = TempDir::new().unwrap();
    let path = msal_package().write_to(temp.path());
    let expectation = release_expectation(VERSION);
    let inspector = AuthenticodeInspector::new();

    let first = verify_package(&path, &expectation, &inspector, &mut NoopProgress).unwrap();
    let second = verify_package(&path, &expectation, &inspector, &mut NoopProgress).unwrap();
    assert_eq!(first.report, second.report);
    assert_eq!(first.inspection.entries, second.inspection.entries);
}

#[test]
fn test_corrupt_package_is_fatal() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.nupkg");
    std::fs::write(&path, b"PK\x03\x04 truncated").unwrap();
    let err = verify_package(
        &path,
        &ManifestExpectation::msal(VERSION),
        &AuthenticodeInspector::new(),
        &mut NoopProgress,
    )
    .unwrap_err();
    assert!(matches!(err, VerifyError::InvalidArchive(_)));
    assert!(err.is_package_defect());
}

#[test]
fn test_json_table_drives_the_same_engine() {
    let json = r#"{
        "metadata": [
            { "field": "Id", "expected": "contoso.client" },
            { "field": "Version", "expected": "{version}", "comparator": "exact" },
            { "field": "IsSigned", "expected": false }
        ],
        "file_counts": { "total": 2, "binaries": 1, "non_binaries": 1 },
        "inventory": {
            "assembly_name": "Contoso.Client",
            "platforms": [],
            "extra_files": [
                { "label": "net45 - lib dll", "path": "lib/net45/Contoso.Client.dll", "binary": true },
                { "label": "readme", "path": "README.md" }
            ]
        }
    }"#;
    let temp = TempDir::new().unwrap();
    let path = NupkgBuilder::new("Contoso.Client", "1.2.3")
        .add_file("lib/net45/Contoso.Client.dll", &signed_pe("CN=Contoso"))
        .add_file("README.md", b"# Contoso")
        .write_to(temp.path());

    let expectation = ManifestExpectation::from_json_str(json, "1.2.3").unwrap();
    let outcome = verify_package(
        &path,
        &expectation,
        &AuthenticodeInspector::new(),
        &mut NoopProgress,
    )
    .unwrap();
    assert!(outcome.passed(), "{:?}", failed_labels(&outcome));
    // 3 metadata fields, 3 counts, 2 existence checks, 1 signature check.
    assert_eq!(outcome.report.total(), 9);
}
