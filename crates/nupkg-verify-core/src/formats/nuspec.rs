//! `.nuspec` manifest parsing.
//!
//! The manifest is deserialized with `quick-xml`'s serde support into a
//! private wire shape, then normalized into [`PackageMetadata`]: text is
//! trimmed, empty elements become `None`, and flags default to `false`.

use serde::Deserialize;

use super::version::PackageVersion;
use crate::Result;
use crate::VerifyError;

/// Source repository declared by the package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Repository {
    /// Repository type, usually `git`.
    pub kind: Option<String>,
    /// Repository URL.
    pub url: Option<String>,
    /// Branch the package was built from.
    pub branch: Option<String>,
    /// Commit the package was built from.
    pub commit: Option<String>,
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(kind) = &self.kind {
            parts.push(format!("type={kind}"));
        }
        if let Some(url) = &self.url {
            parts.push(format!("url={url}"));
        }
        if let Some(branch) = &self.branch {
            parts.push(format!("branch={branch}"));
        }
        if let Some(commit) = &self.commit {
            parts.push(format!("commit={commit}"));
        }
        f.write_str(&parts.join(" "))
    }
}

/// License declaration (`<license type="expression">MIT</license>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    /// `expression` or `file`.
    pub kind: Option<String>,
    /// The expression or file name.
    pub value: String,
}

impl std::fmt::Display for License {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{kind}: {}", self.value),
            None => f.write_str(&self.value),
        }
    }
}

/// Package-level metadata read from the `.nuspec` manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    /// Package identifier.
    pub id: String,
    /// Package version.
    pub version: PackageVersion,
    /// Human-friendly title.
    pub title: Option<String>,
    /// Authors, split on commas.
    pub authors: Vec<String>,
    /// Owners, split on commas.
    pub owners: Vec<String>,
    /// Long description.
    pub description: Option<String>,
    /// Short summary.
    pub summary: Option<String>,
    /// Release notes.
    pub release_notes: Option<String>,
    /// Copyright notice.
    pub copyright: Option<String>,
    /// Locale of the package.
    pub language: Option<String>,
    /// Raw tag list as written in the manifest.
    pub raw_tags: Option<String>,
    /// Icon URL.
    pub icon_url: Option<String>,
    /// License URL.
    pub license_url: Option<String>,
    /// Project URL.
    pub project_url: Option<String>,
    /// Report-abuse URL.
    pub report_abuse_url: Option<String>,
    /// Source repository.
    pub repository: Option<Repository>,
    /// License expression or file.
    pub license: Option<License>,
    /// Whether consumers must accept the license.
    pub require_license_acceptance: bool,
    /// Whether the package is serviceable.
    pub serviceable: bool,
    /// Whether the package is a development-only dependency.
    pub development_dependency: bool,
    /// Minimum NuGet client version.
    pub min_client_version: Option<String>,
    /// Declared package types.
    pub package_types: Vec<String>,
    /// Explicit assembly references, across all groups.
    pub references: Vec<String>,
}

impl PackageMetadata {
    /// `"<id> <version>"`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.id, self.version)
    }

    /// Authors joined with commas, as they are compared.
    #[must_use]
    pub fn authors_joined(&self) -> String {
        self.authors.join(",")
    }

    /// Tags in index form: single-space separated and padded with one space
    /// on each side, so every tag can be matched as `" tag "`.
    #[must_use]
    pub fn tags(&self) -> Option<String> {
        let raw = self.raw_tags.as_deref()?;
        let joined = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(format!(" {joined} "))
    }

    /// See [`PackageVersion::is_prerelease`].
    #[must_use]
    pub const fn is_prerelease(&self) -> bool {
        self.version.is_prerelease()
    }

    /// See [`PackageVersion::is_release_version`].
    #[must_use]
    pub const fn is_release_version(&self) -> bool {
        self.version.is_release_version()
    }
}

#[derive(Debug, Deserialize)]
struct NuspecDocument {
    metadata: NuspecMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NuspecMetadata {
    #[serde(rename = "@minClientVersion", default)]
    min_client_version: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Option<String>,
    #[serde(default)]
    owners: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    release_notes: Option<String>,
    #[serde(default)]
    copyright: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    icon_url: Option<String>,
    #[serde(default)]
    license_url: Option<String>,
    #[serde(default)]
    project_url: Option<String>,
    #[serde(default)]
    report_abuse_url: Option<String>,
    #[serde(default)]
    require_license_acceptance: Option<String>,
    #[serde(default)]
    serviceable: Option<String>,
    #[serde(default)]
    development_dependency: Option<String>,
    #[serde(default)]
    repository: Option<RepositoryXml>,
    #[serde(default)]
    license: Option<LicenseXml>,
    #[serde(default)]
    package_types: Option<PackageTypesXml>,
    #[serde(default)]
    references: Option<ReferencesXml>,
}

#[derive(Debug, Deserialize)]
struct RepositoryXml {
    #[serde(rename = "@type", default)]
    kind: Option<String>,
    #[serde(rename = "@url", default)]
    url: Option<String>,
    #[serde(rename = "@branch", default)]
    branch: Option<String>,
    #[serde(rename = "@commit", default)]
    commit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LicenseXml {
    #[serde(rename = "@type", default)]
    kind: Option<String>,
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct PackageTypesXml {
    #[serde(rename = "packageType", default)]
    items: Vec<PackageTypeXml>,
}

#[derive(Debug, Deserialize)]
struct PackageTypeXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@version", default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReferencesXml {
    #[serde(rename = "reference", default)]
    references: Vec<ReferenceXml>,
    #[serde(rename = "group", default)]
    groups: Vec<ReferenceGroupXml>,
}

#[derive(Debug, Deserialize)]
struct ReferenceGroupXml {
    #[serde(rename = "reference", default)]
    references: Vec<ReferenceXml>,
}

#[derive(Debug, Deserialize)]
struct ReferenceXml {
    #[serde(rename = "@file")]
    file: String,
}

/// Parses `.nuspec` XML into [`PackageMetadata`].
///
/// `<id>` and `<version>` are required; everything else is optional.
///
/// # Examples
///
/// ```
/// use nupkg_verify_core::formats::parse_nuspec;
///
/// let xml = r#"<package><metadata><id>Demo</id><version>1.0.0</version>
///   <authors>Alice, Bob</authors></metadata></package>"#;
/// let metadata = parse_nuspec(xml)?;
/// assert_eq!(metadata.full_name(), "Demo 1.0.0");
/// assert_eq!(metadata.authors_joined(), "Alice,Bob");
/// # Ok::<(), nupkg_verify_core::VerifyError>(())
/// ```
pub fn parse_nuspec(xml: &str) -> Result<PackageMetadata> {
    // XML end-of-line handling: CRLF and lone CR both read as LF.
    let xml = xml.trim_start_matches('\u{feff}').replace("\r\n", "\n").replace('\r', "\n");
    let document: NuspecDocument =
        quick_xml::de::from_str(&xml).map_err(|e| VerifyError::InvalidManifest(e.to_string()))?;
    let m = document.metadata;

    let id = clean(m.id).ok_or_else(|| VerifyError::InvalidManifest("missing <id>".into()))?;
    let version = clean(m.version)
        .ok_or_else(|| VerifyError::InvalidManifest("missing <version>".into()))?;
    let version = PackageVersion::parse(&version)?;

    let repository = m.repository.map(|r| Repository {
        kind: clean(r.kind),
        url: clean(r.url),
        branch: clean(r.branch),
        commit: clean(r.commit),
    });
    let license = m.license.map(|l| License {
        kind: clean(l.kind),
        value: l.value.trim().to_string(),
    });
    let package_types = m
        .package_types
        .map(|types| {
            types
                .items
                .into_iter()
                .map(|t| match clean(t.version) {
                    Some(version) => format!("{},{version}", t.name.trim()),
                    None => t.name.trim().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    let references = m
        .references
        .map(|refs| {
            refs.references
                .into_iter()
                .chain(refs.groups.into_iter().flat_map(|g| g.references))
                .map(|r| r.file.trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(PackageMetadata {
        id,
        version,
        title: clean(m.title),
        authors: split_list(m.authors),
        owners: split_list(m.owners),
        description: clean(m.description),
        summary: clean(m.summary),
        release_notes: clean(m.release_notes),
        copyright: clean(m.copyright),
        language: clean(m.language),
        raw_tags: clean(m.tags),
        icon_url: clean(m.icon_url),
        license_url: clean(m.license_url),
        project_url: clean(m.project_url),
        report_abuse_url: clean(m.report_abuse_url),
        repository,
        license,
        require_license_acceptance: flag(m.require_license_acceptance),
        serviceable: flag(m.serviceable),
        development_dependency: flag(m.development_dependency),
        min_client_version: clean(m.min_client_version),
        package_types,
        references,
    })
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag(value: Option<String>) -> bool {
    clean(value).is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn split_list(value: Option<String>) -> Vec<String> {
    clean(value)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
