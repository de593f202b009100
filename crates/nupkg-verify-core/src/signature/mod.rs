//! Signature inspection for package files and the package itself.
//!
//! [`SignatureInspector`] is the seam between the orchestrator and the
//! platform-specific signature checks. [`AuthenticodeInspector`] is the
//! built-in implementation: it reads Authenticode signatures embedded in PE
//! images and the NuGet `.signature.p7s` package signature.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::Result;

pub mod authenticode;
pub mod digest;
pub mod package;
pub mod pe;
pub mod pkcs7;

pub use authenticode::AuthenticodeInspector;
pub use digest::DigestAlgorithm;

/// Outcome of checking one file's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureVerdict {
    /// Signature present and consistent with the file.
    Valid,
    /// The file is signable but carries no signature.
    NoSignature,
    /// The signed digest does not match the file contents.
    BadDigest,
    /// A signature blob is present but cannot be decoded.
    MalformedSignature,
    /// The signature uses a digest algorithm this crate does not support.
    UnsupportedAlgorithm,
    /// The signer certificate is not embedded in the signature.
    UnknownSigner,
    /// The file is not in a signable format.
    UnknownSubject,
}

impl SignatureVerdict {
    /// Name used in reports, e.g. `Valid`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::NoSignature => "NoSignature",
            Self::BadDigest => "BadDigest",
            Self::MalformedSignature => "MalformedSignature",
            Self::UnsupportedAlgorithm => "UnsupportedAlgorithm",
            Self::UnknownSigner => "UnknownSigner",
            Self::UnknownSubject => "UnknownSubject",
        }
    }

    /// Whether this is [`SignatureVerdict::Valid`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for SignatureVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One signer found on a file or package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureRecord {
    /// Signer certificate subject, when the certificate is embedded.
    pub subject: Option<String>,
    /// Signer certificate issuer.
    pub issuer: Option<String>,
    /// Signer certificate serial number, upper-case hex.
    pub serial_number: String,
    /// Digest algorithm name, e.g. `SHA256`.
    pub digest_algorithm: String,
    /// Whether this came from a nested (secondary) signature.
    pub nested: bool,
}

impl fmt::Display for SignatureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]",
            self.subject.as_deref().unwrap_or("<unknown signer>"),
            self.digest_algorithm
        )?;
        if self.nested {
            f.write_str(" (nested)")?;
        }
        Ok(())
    }
}

/// All signatures on one file, plus the overall verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSignatures {
    /// Signers, primary first.
    pub signatures: Vec<SignatureRecord>,
    /// Verdict for the primary signature.
    pub verdict: SignatureVerdict,
}

impl FileSignatures {
    /// A file with no signers and the given verdict.
    #[must_use]
    pub const fn unsigned(verdict: SignatureVerdict) -> Self {
        Self {
            signatures: Vec::new(),
            verdict,
        }
    }
}

/// Result of checking the package-level signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSignatureStatus {
    /// The archive carries a `.signature.p7s` entry.
    pub is_signed: bool,
    /// The signature is consistent with the archive contents.
    pub is_valid: bool,
    /// Verdict for the package signature; `None` when unsigned.
    pub verdict: Option<SignatureVerdict>,
    /// Signers of the package signature.
    pub signatures: Vec<SignatureRecord>,
}

impl PackageSignatureStatus {
    /// Status of a package without a signature entry.
    #[must_use]
    pub const fn unsigned() -> Self {
        Self {
            is_signed: false,
            is_valid: false,
            verdict: None,
            signatures: Vec::new(),
        }
    }

    /// Status of a signed package with the given verdict.
    #[must_use]
    pub const fn signed(verdict: SignatureVerdict, signatures: Vec<SignatureRecord>) -> Self {
        Self {
            is_signed: true,
            is_valid: verdict.is_valid(),
            verdict: Some(verdict),
            signatures,
        }
    }
}

/// Checks signatures of extracted files and of whole packages.
pub trait SignatureInspector {
    /// Inspects one extracted file.
    ///
    /// # Errors
    ///
    /// Returns an error only when the file cannot be read; signature
    /// problems are reported through the verdict.
    fn inspect_file(&self, path: &Path) -> Result<FileSignatures>;

    /// Verifies the package signature of a `.nupkg` file.
    ///
    /// # Errors
    ///
    /// Returns an error only when the package cannot be read.
    fn verify_package(&self, path: &Path) -> Result<PackageSignatureStatus>;
}
