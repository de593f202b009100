//! NuGet package version strings.

use std::fmt;

use crate::Result;
use crate::VerifyError;

/// A NuGet package version: 1 to 4 numeric parts, an optional `-label`
/// release label and optional `+metadata` build metadata.
///
/// The original text is kept for display and comparison.
///
/// # Examples
///
/// ```
/// use nupkg_verify_core::formats::PackageVersion;
///
/// let v = PackageVersion::parse("2.7.0-preview+abc123")?;
/// assert!(v.is_prerelease());
/// assert_eq!(v.release_label(), Some("preview"));
/// assert_eq!(v.build_metadata(), Some("abc123"));
/// # Ok::<(), nupkg_verify_core::VerifyError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    original: String,
    parts: Vec<u64>,
    release_label: Option<String>,
    build_metadata: Option<String>,
}

impl PackageVersion {
    /// Parses a version string, ignoring surrounding whitespace.
    pub fn parse(text: &str) -> Result<Self> {
        let original = text.trim();
        let invalid = || VerifyError::InvalidVersion(original.to_string());

        let (rest, build_metadata) = match original.split_once('+') {
            Some((rest, meta)) if is_label(meta) => (rest, Some(meta.to_string())),
            Some(_) => return Err(invalid()),
            None => (original, None),
        };
        let (numbers, release_label) = match rest.split_once('-') {
            Some((numbers, label)) if is_label(label) => (numbers, Some(label.to_string())),
            Some(_) => return Err(invalid()),
            None => (rest, None),
        };

        let parts = numbers
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                part.parse::<u64>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>>>()?;

        if parts.is_empty() || parts.len() > 4 {
            return Err(invalid());
        }

        Ok(Self {
            original: original.to_string(),
            parts,
            release_label,
            build_metadata,
        })
    }

    /// Numeric parts as written (1 to 4 of them).
    #[must_use]
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// The `-label` part, if any.
    #[must_use]
    pub fn release_label(&self) -> Option<&str> {
        self.release_label.as_deref()
    }

    /// The `+metadata` part, if any.
    #[must_use]
    pub fn build_metadata(&self) -> Option<&str> {
        self.build_metadata.as_deref()
    }

    /// A version is a prerelease when it carries a release label.
    #[must_use]
    pub const fn is_prerelease(&self) -> bool {
        self.release_label.is_some()
    }

    /// Opposite of [`is_prerelease`](Self::is_prerelease). Build metadata
    /// does not affect it.
    #[must_use]
    pub const fn is_release_version(&self) -> bool {
        !self.is_prerelease()
    }

    /// The version text as it appears in the manifest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

fn is_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .split('.')
            .all(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_version() {
        let v = PackageVersion::parse("2.7.0").unwrap();
        assert_eq!(v.parts(), &[2, 7, 0]);
        assert!(!v.is_prerelease());
        assert!(v.is_release_version());
        assert_eq!(v.to_string(), "2.7.0");
    }

    #[test]
    fn test_four_part_version() {
        let v = PackageVersion::parse("1.0.0.12").unwrap();
        assert_eq!(v.parts(), &[1, 0, 0, 12]);
    }

    #[test]
    fn test_prerelease_label() {
        let v = PackageVersion::parse("3.0.0-preview.2").unwrap();
        assert!(v.is_prerelease());
        assert!(!v.is_release_version());
        assert_eq!(v.release_label(), Some("preview.2"));
    }

    #[test]
    fn test_build_metadata_keeps_release_version() {
        let v = PackageVersion::parse("2.7.0+sha.1a2b").unwrap();
        assert!(!v.is_prerelease());
        assert!(v.is_release_version());
        assert_eq!(v.build_metadata(), Some("sha.1a2b"));

        assert!(PackageVersion::parse("1.0.0+meta").unwrap().is_release_version());
        assert!(!PackageVersion::parse("1.0.0-beta+meta").unwrap().is_release_version());
    }

    #[test]
    fn test_label_with_hyphen() {
        let v = PackageVersion::parse("1.0.0-rc-1").unwrap();
        assert_eq!(v.release_label(), Some("rc-1"));
    }

    #[test]
    fn test_whitespace_trimmed() {
        let v = PackageVersion::parse("  1.2.3\n").unwrap();
        assert_eq!(v.as_str(), "1.2.3");
    }

    #[test]
    fn test_invalid_versions() {
        for text in ["", "abc", "1..2", "1.2.3.4.5", "1.0-", "1.0+", "1.0-beta!", "-1.0"] {
            let err = PackageVersion::parse(text).unwrap_err();
            assert!(matches!(err, VerifyError::InvalidVersion(_)), "{text}");
        }
    }
}
