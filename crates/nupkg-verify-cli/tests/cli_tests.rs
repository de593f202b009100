//! Integration tests for nupkg-verify.
//!
//! Note: Tests use `unwrap`/`expect` which is acceptable in test code.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use nupkg_verify_core::test_utils::NupkgBuilder;
use nupkg_verify_core::test_utils::signing::signed_pe;
use nupkg_verify_core::test_utils::signing::test_certificate;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

const TABLE: &str = r#"{
    "metadata": [
        { "field": "Id", "expected": "Contoso.Client" },
        { "field": "Version", "expected": "{version}" },
        { "field": "Authors", "expected": "contoso" },
        { "field": "IsSigned", "expected": true },
        { "field": "IsSignatureValid", "expected": true }
    ],
    "file_counts": { "total": 3, "binaries": 1, "non_binaries": 2 },
    "inventory": {
        "assembly_name": "Contoso.Client",
        "platforms": [],
        "extra_files": [
            { "label": "net45 - lib dll", "path": "lib/net45/Contoso.Client.dll", "binary": true },
            { "label": "net45 - lib xml", "path": "lib/net45/Contoso.Client.xml" },
            { "label": "readme", "path": "README.md" }
        ]
    }
}"#;

fn nupkg_verify_cmd() -> Command {
    cargo_bin_cmd!("nupkg-verify")
}

fn contoso_package() -> NupkgBuilder {
    NupkgBuilder::new("Contoso.Client", "1.2.3")
        .metadata("authors", "Contoso")
        .add_file("lib/net45/Contoso.Client.dll", &signed_pe("CN=Contoso"))
        .add_file("lib/net45/Contoso.Client.xml", b"<doc/>")
        .add_file("README.md", b"# Contoso")
        .signed(Some(test_certificate("CN=Contoso")))
}

/// Writes the package and the expectation table, returning their paths.
fn fixture(builder: &NupkgBuilder) -> (TempDir, PathBuf, PathBuf) {
    let temp = TempDir::new().expect("failed to create temp dir");
    let package = builder.write_to(temp.path());
    let table = temp.path().join("expectations.json");
    std::fs::write(&table, TABLE).unwrap();
    (temp, package, table)
}

#[test]
fn test_help_flag() {
    nupkg_verify_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--filePath"))
        .stdout(predicate::str::contains("--expectations"));
}

#[test]
fn test_missing_arguments_is_usage_error() {
    nupkg_verify_cmd()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--filePath"))
        .stderr(predicate::str::contains("--version"));
}

#[test]
fn test_version_flag_takes_a_value() {
    nupkg_verify_cmd()
        .arg("--filePath")
        .arg("a.nupkg")
        .arg("--version")
        .assert()
        .code(2);
}

#[test]
fn test_passing_package() {
    let (_temp, package, table) = fixture(&contoso_package());

    nupkg_verify_cmd()
        .arg("--filePath")
        .arg(&package)
        .arg("--version")
        .arg("1.2.3")
        .arg("--expectations")
        .arg(&table)
        .assert()
        .success()
        .stdout(predicate::str::contains("Loading"))
        .stdout(predicate::str::contains("Id: OK"))
        .stdout(predicate::str::contains("net45 - lib dll Signed: OK"))
        .stdout(predicate::str::contains("All 12 checks passed"));
}

#[test]
fn test_failed_checks_exit_one() {
    let (_temp, package, table) = fixture(&contoso_package());

    nupkg_verify_cmd()
        .arg("--file-path")
        .arg(&package)
        .arg("--version")
        .arg("2.0.0")
        .arg("--expectations")
        .arg(&table)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Version: FAIL! expected(2.0.0) actual(1.2.3)",
        ))
        .stdout(predicate::str::contains("1 of 12 checks failed"));
}

#[test]
fn test_builtin_table_is_used_by_default() {
    let (_temp, package, _table) = fixture(&contoso_package());

    nupkg_verify_cmd()
        .arg("--filePath")
        .arg(&package)
        .arg("--version")
        .arg("1.2.3")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Id: FAIL! expected(Microsoft.Identity.Client) actual(Contoso.Client)",
        ))
        .stdout(predicate::str::contains("Is Signed: OK"))
        .stdout(predicate::str::contains("net45 - lib dll Exists: FAIL!"));
}

#[test]
fn test_unsigned_binary_fails_signed_check() {
    let builder = contoso_package()
        .without_file("lib/net45/Contoso.Client.dll")
        .add_file(
            "lib/net45/Contoso.Client.dll",
            &nupkg_verify_core::test_utils::pe_image(false),
        );
    let (_temp, package, table) = fixture(&builder);

    nupkg_verify_cmd()
        .arg("--filePath")
        .arg(&package)
        .arg("--version")
        .arg("1.2.3")
        .arg("--expectations")
        .arg(&table)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "net45 - lib dll Signed: FAIL! expected(Valid) actual(NoSignature)",
        ))
        .stdout(predicate::str::contains("net45 - lib dll Exists: OK"));
}

#[test]
fn test_verbose_dump() {
    let (_temp, package, table) = fixture(&contoso_package());

    nupkg_verify_cmd()
        .arg("--filePath")
        .arg(&package)
        .arg("--version")
        .arg("1.2.3")
        .arg("--expectations")
        .arg(&table)
        .arg("-v")
        .assert()
        .success()
        .stdout(predicate::str::contains("Verbose Output..."))
        .stdout(predicate::str::contains("Authors: Contoso"))
        .stdout(predicate::str::contains(
            "Signature Verification Result (signed): True",
        ))
        .stdout(predicate::str::contains(
            r"Name: (lib\net45\Contoso.Client.dll) IsValidSig: Valid",
        ))
        .stdout(predicate::str::contains(
            "Name: (README.md) IsValidSig: N/A  FileSize(9)",
        ));
}

#[test]
fn test_quiet_prints_only_failures() {
    let (_temp, package, table) = fixture(&contoso_package());

    nupkg_verify_cmd()
        .arg("--filePath")
        .arg(&package)
        .arg("--version")
        .arg("2.0.0")
        .arg("--expectations")
        .arg(&table)
        .arg("-q")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Version: FAIL!"))
        .stdout(predicate::str::contains(": OK").not())
        .stdout(predicate::str::contains("Loading").not());
}

#[test]
fn test_json_output_format() {
    let (_temp, package, table) = fixture(&contoso_package());

    let output = nupkg_verify_cmd()
        .arg("--filePath")
        .arg(&package)
        .arg("--version")
        .arg("1.2.3")
        .arg("--expectations")
        .arg(&table)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).expect("invalid JSON output");
    assert_eq!(json["operation"], "verify");
    assert_eq!(json["status"], "passed");
    assert_eq!(json["data"]["id"], "Contoso.Client");
    assert_eq!(json["data"]["total"], 12);
    assert_eq!(json["data"]["failed"], 0);
    assert_eq!(json["data"]["results"].as_array().unwrap().len(), 12);
    assert_eq!(json["data"]["package_signature"]["is_valid"], true);
}

#[test]
fn test_json_output_on_failure() {
    let (_temp, package, table) = fixture(&contoso_package());

    let output = nupkg_verify_cmd()
        .arg("--filePath")
        .arg(&package)
        .arg("--version")
        .arg("9.9.9")
        .arg("--expectations")
        .arg(&table)
        .arg("--json")
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).expect("invalid JSON output");
    assert_eq!(json["status"], "failed");
    assert_eq!(json["data"]["failed"], 1);
}

#[test]
fn test_nonexistent_package_is_fatal() {
    nupkg_verify_cmd()
        .arg("--filePath")
        .arg("/nonexistent/package.nupkg")
        .arg("--version")
        .arg("1.0.0")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("I/O error"))
        .stderr(predicate::str::contains("HINT"));
}

#[test]
fn test_corrupt_package_is_fatal() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let package = temp.path().join("broken.nupkg");
    std::fs::write(&package, b"this is not a zip").unwrap();

    nupkg_verify_cmd()
        .arg("--filePath")
        .arg(&package)
        .arg("--version")
        .arg("1.0.0")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid package"));
}

#[test]
fn test_bad_expectation_table_is_fatal() {
    let (temp, package, _table) = fixture(&contoso_package());
    let table = temp.path().join("bad.json");
    std::fs::write(&table, r#"{ "metadata": [] }"#).unwrap();

    nupkg_verify_cmd()
        .arg("--filePath")
        .arg(&package)
        .arg("--version")
        .arg("1.2.3")
        .arg("--expectations")
        .arg(&table)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("invalid expectation table"));
}

#[test]
fn test_json_error_output() {
    let output = nupkg_verify_cmd()
        .arg("--filePath")
        .arg("/nonexistent/package.nupkg")
        .arg("--version")
        .arg("1.0.0")
        .arg("--json")
        .assert()
        .code(3)
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).expect("invalid JSON output");
    assert_eq!(json["status"], "error");
    assert!(json["error"].as_str().unwrap().contains("I/O error"));
}
