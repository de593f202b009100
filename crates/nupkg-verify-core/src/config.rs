//! Expected release manifest.
//!
//! A [`ManifestExpectation`] says what a correct release package looks like:
//! metadata values, file counts, and the per-platform file inventory. The
//! built-in table describes the Microsoft Authentication Library (MSAL)
//! release; other tables can be loaded from JSON.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::Result;
use crate::VerifyError;
use crate::inspection::PackageInspection;
use crate::validation::Comparator;
use crate::validation::FieldValue;

/// Placeholder replaced by the expected version in loaded tables.
pub const VERSION_PLACEHOLDER: &str = "{version}";

const MSAL_ASSEMBLY: &str = "Microsoft.Identity.Client";

const MSAL_DESCRIPTION: &str = "This package contains the binaries of the Microsoft Authentication Library (MSAL).\n      MSAL makes it easy to obtain tokens from Azure AD v2 (work & school accounts, MSA) and Azure AD B2C, gaining access to Microsoft Cloud API and any other API secured by Microsoft identities. This version supports adding authentication functionality to your .NET based client on Windows desktop (.NET 4.5+), UWP, .NET Core, Xamarin iOS and Xamarin Android.";

const MSAL_TAGS: &str = " Microsoft Authentication Library MSA MSAL B2C Azure Active Directory AAD Identity Authentication .NET Windows Store Xamarin iOS Android ";

const MSAL_PLATFORMS: [&str; 6] = [
    "monoandroid81",
    "net45",
    "netcoreapp1.0",
    "netstandard1.3",
    "uap10.0",
    "xamarinios10",
];

/// Package-level field that can be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataField {
    /// `<title>`
    Title,
    /// `<version>`, as written.
    Version,
    /// `<authors>`, comma-joined.
    Authors,
    /// `<copyright>`
    Copyright,
    /// `<description>`
    Description,
    /// `"<id> <version>"`
    FullName,
    /// `<iconUrl>`
    IconUrl,
    /// `<id>`
    Id,
    /// Version has a release label.
    IsPrerelease,
    /// Version has no release label; build metadata is ignored.
    IsReleaseVersion,
    /// `<licenseUrl>`
    LicenseUrl,
    /// `<projectUrl>`
    ProjectUrl,
    /// `<reportAbuseUrl>`
    ReportAbuseUrl,
    /// `<repository>`, rendered as `type=… url=…`.
    Repository,
    /// `<requireLicenseAcceptance>`
    RequireLicenseAcceptance,
    /// `<serviceable>`
    Serviceable,
    /// `<summary>`
    Summary,
    /// `<tags>`, normalized and space-padded.
    Tags,
    /// The package carries a signature.
    #[serde(alias = "Is Signed")]
    IsSigned,
    /// The package signature is valid.
    #[serde(alias = "Is Signature Valid")]
    IsSignatureValid,
    /// `<owners>`, comma-joined.
    Owners,
    /// `<releaseNotes>`
    ReleaseNotes,
    /// `<language>`
    Language,
    /// `<developmentDependency>`
    DevelopmentDependency,
    /// `minClientVersion` attribute.
    MinClientVersion,
    /// `<license>`, rendered as `type: value`.
    License,
}

/// Kind of value a [`MetadataField`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Optional text.
    Text,
    /// Boolean.
    Flag,
}

impl MetadataField {
    /// Label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Version => "Version",
            Self::Authors => "Authors",
            Self::Copyright => "Copyright",
            Self::Description => "Description",
            Self::FullName => "FullName",
            Self::IconUrl => "IconUrl",
            Self::Id => "Id",
            Self::IsPrerelease => "IsPrerelease",
            Self::IsReleaseVersion => "IsReleaseVersion",
            Self::LicenseUrl => "LicenseUrl",
            Self::ProjectUrl => "ProjectUrl",
            Self::ReportAbuseUrl => "ReportAbuseUrl",
            Self::Repository => "Repository",
            Self::RequireLicenseAcceptance => "RequireLicenseAcceptance",
            Self::Serviceable => "Serviceable",
            Self::Summary => "Summary",
            Self::Tags => "Tags",
            Self::IsSigned => "Is Signed",
            Self::IsSignatureValid => "Is Signature Valid",
            Self::Owners => "Owners",
            Self::ReleaseNotes => "ReleaseNotes",
            Self::Language => "Language",
            Self::DevelopmentDependency => "DevelopmentDependency",
            Self::MinClientVersion => "MinClientVersion",
            Self::License => "License",
        }
    }

    /// Kind of value the field holds.
    #[must_use]
    pub const fn kind(self) -> FieldKind {
        match self {
            Self::IsPrerelease
            | Self::IsReleaseVersion
            | Self::RequireLicenseAcceptance
            | Self::Serviceable
            | Self::IsSigned
            | Self::IsSignatureValid
            | Self::DevelopmentDependency => FieldKind::Flag,
            _ => FieldKind::Text,
        }
    }

    /// Reads the field's actual value from an inspected package.
    #[must_use]
    pub fn actual(self, inspection: &PackageInspection) -> FieldValue {
        let m = &inspection.metadata;
        let signature = &inspection.package_signature;
        match self {
            Self::Title => FieldValue::Text(m.title.clone()),
            Self::Version => FieldValue::Text(Some(m.version.to_string())),
            Self::Authors => FieldValue::Text(Some(m.authors_joined())),
            Self::Copyright => FieldValue::Text(m.copyright.clone()),
            Self::Description => FieldValue::Text(m.description.clone()),
            Self::FullName => FieldValue::Text(Some(m.full_name())),
            Self::IconUrl => FieldValue::Text(m.icon_url.clone()),
            Self::Id => FieldValue::Text(Some(m.id.clone())),
            Self::IsPrerelease => FieldValue::Flag(m.is_prerelease()),
            Self::IsReleaseVersion => FieldValue::Flag(m.is_release_version()),
            Self::LicenseUrl => FieldValue::Text(m.license_url.clone()),
            Self::ProjectUrl => FieldValue::Text(m.project_url.clone()),
            Self::ReportAbuseUrl => FieldValue::Text(m.report_abuse_url.clone()),
            Self::Repository => FieldValue::Text(m.repository.as_ref().map(ToString::to_string)),
            Self::RequireLicenseAcceptance => FieldValue::Flag(m.require_license_acceptance),
            Self::Serviceable => FieldValue::Flag(m.serviceable),
            Self::Summary => FieldValue::Text(m.summary.clone()),
            Self::Tags => FieldValue::Text(m.tags()),
            Self::IsSigned => FieldValue::Flag(signature.is_signed),
            Self::IsSignatureValid => FieldValue::Flag(signature.is_valid),
            Self::Owners => FieldValue::Text(Some(m.owners.join(","))),
            Self::ReleaseNotes => FieldValue::Text(m.release_notes.clone()),
            Self::Language => FieldValue::Text(m.language.clone()),
            Self::DevelopmentDependency => FieldValue::Flag(m.development_dependency),
            Self::MinClientVersion => FieldValue::Text(m.min_client_version.clone()),
            Self::License => FieldValue::Text(m.license.as_ref().map(ToString::to_string)),
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Expected value of one metadata field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExpectation {
    /// Field to check.
    pub field: MetadataField,
    /// Expected value.
    pub expected: FieldValue,
    /// Comparator; `None` uses the value kind's default.
    pub comparator: Option<Comparator>,
}

impl FieldExpectation {
    /// Expects a text value; `None` expects the field to be absent.
    #[must_use]
    pub fn text(field: MetadataField, expected: Option<&str>) -> Self {
        Self {
            field,
            expected: FieldValue::text(expected),
            comparator: None,
        }
    }

    /// Expects a boolean value.
    #[must_use]
    pub const fn flag(field: MetadataField, expected: bool) -> Self {
        Self {
            field,
            expected: FieldValue::Flag(expected),
            comparator: None,
        }
    }
}

/// Expected number of distinct package files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCountExpectation {
    /// All files.
    pub total: usize,
    /// `.dll` files.
    pub binaries: usize,
    /// Everything else.
    pub non_binaries: usize,
}

/// A file expected outside the per-platform layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraFile {
    /// Check label prefix, e.g. `uap10.0 - lib pri`.
    pub label: String,
    /// Package path with `\` separators.
    pub path: String,
    /// Whether the file is a binary that must be validly signed.
    #[serde(default)]
    pub binary: bool,
}

/// Expected file layout.
///
/// Every platform contributes four files: `lib\<platform>\<assembly>.dll`,
/// `lib\<platform>\<assembly>.xml`, and the same two under `ref\`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryExpectation {
    /// Assembly file stem, e.g. `Microsoft.Identity.Client`.
    pub assembly_name: String,
    /// Target framework folders, in check order.
    pub platforms: Vec<String>,
    /// Additional files, checked after the platforms.
    #[serde(default)]
    pub extra_files: Vec<ExtraFile>,
}

/// One expected file, derived from an [`InventoryExpectation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCheck {
    /// Check label prefix.
    pub label: String,
    /// Package path with `\` separators.
    pub path: String,
    /// Whether a `Signed` check follows the `Exists` check.
    pub binary: bool,
}

impl InventoryExpectation {
    /// Expected files in check order.
    ///
    /// # Examples
    ///
    /// ```
    /// use nupkg_verify_core::config::InventoryExpectation;
    ///
    /// let inventory = InventoryExpectation {
    ///     assembly_name: "Microsoft.Identity.Client".into(),
    ///     platforms: vec!["net45".into()],
    ///     extra_files: Vec::new(),
    /// };
    /// let checks = inventory.checks();
    /// assert_eq!(checks[0].label, "net45 - lib dll");
    /// assert_eq!(checks[0].path, r"lib\net45\Microsoft.Identity.Client.dll");
    /// assert_eq!(checks[3].path, r"ref\net45\Microsoft.Identity.Client.xml");
    /// ```
    #[must_use]
    pub fn checks(&self) -> Vec<FileCheck> {
        let assembly = &self.assembly_name;
        let mut checks = Vec::with_capacity(self.platforms.len() * 4 + self.extra_files.len());
        for platform in &self.platforms {
            for (folder, extension, binary) in [
                ("lib", "dll", true),
                ("lib", "xml", false),
                ("ref", "dll", true),
                ("ref", "xml", false),
            ] {
                checks.push(FileCheck {
                    label: format!("{platform} - {folder} {extension}"),
                    path: format!(r"{folder}\{platform}\{assembly}.{extension}"),
                    binary,
                });
            }
        }
        checks.extend(self.extra_files.iter().map(|extra| FileCheck {
            label: extra.label.clone(),
            path: extra.path.replace('/', "\\"),
            binary: extra.binary,
        }));
        checks
    }
}

/// Complete expectation table for one release.
///
/// # Examples
///
/// ```
/// use nupkg_verify_core::ManifestExpectation;
///
/// let expectation = ManifestExpectation::msal("2.7.0");
/// assert_eq!(expectation.metadata.len(), 20);
/// assert_eq!(expectation.file_counts.total, 25);
/// assert_eq!(expectation.inventory.checks().len(), 25);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestExpectation {
    /// Metadata checks, in report order.
    pub metadata: Vec<FieldExpectation>,
    /// Expected file counts.
    pub file_counts: FileCountExpectation,
    /// Expected file layout.
    pub inventory: InventoryExpectation,
}

impl ManifestExpectation {
    /// The built-in MSAL release table for `version`.
    #[must_use]
    pub fn msal(version: &str) -> Self {
        use MetadataField as F;

        let full_name = format!("{MSAL_ASSEMBLY} {version}");
        let metadata = vec![
            FieldExpectation::text(F::Title, Some("Microsoft Authentication Library for .NET")),
            FieldExpectation::text(F::Version, Some(version)),
            FieldExpectation::text(F::Authors, Some("Microsoft")),
            FieldExpectation::text(
                F::Copyright,
                Some("© Microsoft Corporation. All rights reserved."),
            ),
            FieldExpectation::text(F::Description, Some(MSAL_DESCRIPTION)),
            FieldExpectation::text(F::FullName, Some(&full_name)),
            FieldExpectation::text(F::IconUrl, None),
            FieldExpectation::text(F::Id, Some(MSAL_ASSEMBLY)),
            FieldExpectation::flag(F::IsPrerelease, false),
            FieldExpectation::flag(F::IsReleaseVersion, false),
            FieldExpectation::text(
                F::LicenseUrl,
                Some("https://go.microsoft.com/fwlink/?linkid=844762"),
            ),
            FieldExpectation::text(
                F::ProjectUrl,
                Some("https://go.microsoft.com/fwlink/?linkid=844761"),
            ),
            FieldExpectation::text(F::ReportAbuseUrl, None),
            FieldExpectation::text(F::Repository, None),
            FieldExpectation::flag(F::RequireLicenseAcceptance, true),
            FieldExpectation::flag(F::Serviceable, false),
            FieldExpectation::text(F::Summary, None),
            FieldExpectation::text(F::Tags, Some(MSAL_TAGS)),
            FieldExpectation::flag(F::IsSigned, true),
            FieldExpectation::flag(F::IsSignatureValid, true),
        ];

        Self {
            metadata,
            file_counts: FileCountExpectation {
                total: 25,
                binaries: 12,
                non_binaries: 13,
            },
            inventory: InventoryExpectation {
                assembly_name: MSAL_ASSEMBLY.to_string(),
                platforms: MSAL_PLATFORMS.iter().map(ToString::to_string).collect(),
                // UAP ships one additional file, in lib only.
                extra_files: vec![ExtraFile {
                    label: "uap10.0 - lib pri".to_string(),
                    path: format!(r"lib\uap10.0\{MSAL_ASSEMBLY}.pri"),
                    binary: false,
                }],
            },
        }
    }

    /// Parses a JSON table, replacing `{version}` in text values, labels and
    /// paths with `version`.
    ///
    /// ```json
    /// {
    ///   "metadata": [
    ///     { "field": "Id", "expected": "Contoso.Client" },
    ///     { "field": "Version", "expected": "{version}", "comparator": "exact" },
    ///     { "field": "IconUrl", "expected": null },
    ///     { "field": "IsSigned", "expected": true }
    ///   ],
    ///   "file_counts": { "total": 4, "binaries": 2, "non_binaries": 2 },
    ///   "inventory": {
    ///     "assembly_name": "Contoso.Client",
    ///     "platforms": ["net45"],
    ///     "extra_files": [{ "label": "readme", "path": "README.md" }]
    ///   }
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidExpectation`] if the JSON is malformed
    /// or a value does not fit its field.
    pub fn from_json_str(json: &str, version: &str) -> Result<Self> {
        Self::parse(json, version).map_err(|reason| VerifyError::InvalidExpectation {
            path: None,
            reason,
        })
    }

    /// Reads and parses a JSON table from disk. See
    /// [`ManifestExpectation::from_json_str`].
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidExpectation`] if the file cannot be read
    /// or parsed.
    pub fn from_json_file(path: &Path, version: &str) -> Result<Self> {
        let invalid = |reason: String| VerifyError::InvalidExpectation {
            path: Some(path.to_path_buf()),
            reason,
        };
        let json = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        Self::parse(&json, version).map_err(invalid)
    }

    fn parse(json: &str, version: &str) -> std::result::Result<Self, String> {
        let table: ExpectationFile = serde_json::from_str(json).map_err(|e| e.to_string())?;
        let resolve = |text: &str| text.replace(VERSION_PLACEHOLDER, version);

        let metadata = table
            .metadata
            .into_iter()
            .map(|entry| {
                let expected = match (entry.field.kind(), entry.expected) {
                    (FieldKind::Text, serde_json::Value::Null) => FieldValue::Text(None),
                    (FieldKind::Text, serde_json::Value::String(text)) => {
                        FieldValue::Text(Some(resolve(&text)))
                    }
                    (FieldKind::Flag, serde_json::Value::Bool(flag)) => FieldValue::Flag(flag),
                    (FieldKind::Text, other) => {
                        let field = entry.field;
                        return Err(format!(
                            "field {field}: expected a string or null, got {other}"
                        ));
                    }
                    (FieldKind::Flag, other) => {
                        let field = entry.field;
                        return Err(format!("field {field}: expected a boolean, got {other}"));
                    }
                };
                Ok(FieldExpectation {
                    field: entry.field,
                    expected,
                    comparator: entry.comparator,
                })
            })
            .collect::<std::result::Result<Vec<_>, String>>()?;

        let mut inventory = table.inventory;
        inventory.assembly_name = resolve(&inventory.assembly_name);
        for extra in &mut inventory.extra_files {
            extra.label = resolve(&extra.label);
            extra.path = resolve(&extra.path).replace('/', "\\");
        }

        let counts = table.file_counts;
        if counts.binaries + counts.non_binaries != counts.total {
            return Err(format!(
                "file_counts: binaries ({}) + non_binaries ({}) must equal total ({})",
                counts.binaries, counts.non_binaries, counts.total
            ));
        }

        Ok(Self {
            metadata,
            file_counts: counts,
            inventory,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpectationFile {
    #[serde(default)]
    metadata: Vec<FieldEntry>,
    file_counts: FileCountExpectation,
    inventory: InventoryExpectation,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldEntry {
    field: MetadataField,
    expected: serde_json::Value,
    #[serde(default)]
    comparator: Option<Comparator>,
}
