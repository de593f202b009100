//! Inspected package files.

use std::fmt;

use crate::archive::extension_of;
use crate::signature::SignatureRecord;
use crate::signature::SignatureVerdict;

/// Extension that marks a package file as a signable binary.
pub const BINARY_EXTENSION: &str = ".dll";

/// One inspected file of a package: where it lives, how large it is, and
/// what its signature check reported.
///
/// # Examples
///
/// ```
/// use nupkg_verify_core::PackageEntry;
/// use nupkg_verify_core::SignatureVerdict;
///
/// let entry = PackageEntry::new(
///     r"lib\net45\Microsoft.Identity.Client.DLL",
///     Vec::new(),
///     Some(SignatureVerdict::Valid),
///     1024,
/// );
/// assert!(entry.is_binary());
/// assert_eq!(entry.extension(), ".DLL");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    path: String,
    signatures: Vec<SignatureRecord>,
    verdict: Option<SignatureVerdict>,
    size: u64,
}

impl PackageEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        signatures: Vec<SignatureRecord>,
        verdict: Option<SignatureVerdict>,
        size: u64,
    ) -> Self {
        Self {
            path: path.into(),
            signatures,
            verdict,
            size,
        }
    }

    /// Package-relative path, e.g. `lib\net45\A.dll`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Signers found on the file.
    #[must_use]
    pub fn signatures(&self) -> &[SignatureRecord] {
        &self.signatures
    }

    /// Signature verdict, if the file was checked.
    #[must_use]
    pub const fn verdict(&self) -> Option<SignatureVerdict> {
        self.verdict
    }

    /// Uncompressed size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Extension including the dot, `""` when there is none.
    #[must_use]
    pub fn extension(&self) -> &str {
        extension_of(&self.path)
    }

    /// Whether the file is a `.dll`, in any case.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.extension().eq_ignore_ascii_case(BINARY_EXTENSION)
    }
}

impl fmt::Display for PackageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name: ({}) IsValidSig: ", self.path)?;
        // Only binaries report a signature verdict.
        match self.verdict.filter(|_| self.is_binary()) {
            Some(verdict) => write!(f, "{verdict}")?,
            None => f.write_str("N/A")?,
        }
        write!(f, "  FileSize({})", self.size)
    }
}
