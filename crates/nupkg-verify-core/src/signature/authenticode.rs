//! Authenticode signatures embedded in PE images.

use std::path::Path;

use super::FileSignatures;
use super::PackageSignatureStatus;
use super::SignatureInspector;
use super::SignatureRecord;
use super::SignatureVerdict;
use super::digest::DigestAlgorithm;
use super::package;
use super::pe::PeError;
use super::pe::PeImage;
use super::pkcs7;
use crate::Result;

/// Built-in [`SignatureInspector`].
///
/// Files are checked for an embedded Authenticode signature; packages for
/// a NuGet `.signature.p7s` entry.
///
/// # Examples
///
/// ```no_run
/// use nupkg_verify_core::signature::AuthenticodeInspector;
/// use nupkg_verify_core::signature::SignatureInspector;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let inspector = AuthenticodeInspector::new();
/// let result = inspector.inspect_file("Microsoft.Identity.Client.dll".as_ref())?;
/// println!("{}", result.verdict);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthenticodeInspector;

impl AuthenticodeInspector {
    /// Creates the inspector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Inspects an in-memory image.
    #[must_use]
    pub fn inspect_bytes(&self, bytes: &[u8]) -> FileSignatures {
        let image = match PeImage::parse(bytes) {
            Ok(image) => image,
            Err(PeError::NotPe) => {
                return FileSignatures::unsigned(SignatureVerdict::UnknownSubject);
            }
            Err(PeError::Malformed(reason)) => {
                tracing::debug!(%reason, "unreadable PE image");
                return FileSignatures::unsigned(SignatureVerdict::MalformedSignature);
            }
        };
        if !image.has_certificate_table() {
            return FileSignatures::unsigned(SignatureVerdict::NoSignature);
        }

        let mut signatures = Vec::new();
        let mut verdict = None;
        for blob in image.signed_data() {
            let (entry_verdict, records) = check_entry(&image, blob);
            verdict.get_or_insert(entry_verdict);
            signatures.extend(records);
        }

        FileSignatures {
            signatures,
            verdict: verdict.unwrap_or(SignatureVerdict::NoSignature),
        }
    }
}

fn check_entry(image: &PeImage<'_>, blob: &[u8]) -> (SignatureVerdict, Vec<SignatureRecord>) {
    let Some(signed_data) = pkcs7::decode_signed_data(blob) else {
        return (SignatureVerdict::MalformedSignature, Vec::new());
    };
    let records = pkcs7::signature_records(&signed_data);
    let Some(indirect) = pkcs7::indirect_data(&signed_data) else {
        return (SignatureVerdict::MalformedSignature, records);
    };

    let digest_info = &indirect.message_digest;
    let Some(algorithm) = DigestAlgorithm::from_oid(&digest_info.digest_algorithm.oid) else {
        return (SignatureVerdict::UnsupportedAlgorithm, records);
    };
    if image.image_digest(algorithm) != digest_info.digest.as_bytes() {
        return (SignatureVerdict::BadDigest, records);
    }
    (pkcs7::verify_signer(&signed_data), records)
}

impl SignatureInspector for AuthenticodeInspector {
    fn inspect_file(&self, path: &Path) -> Result<FileSignatures> {
        let bytes = std::fs::read(path)?;
        Ok(self.inspect_bytes(&bytes))
    }

    fn verify_package(&self, path: &Path) -> Result<PackageSignatureStatus> {
        let bytes = std::fs::read(path)?;
        Ok(package::verify_package_signature(&bytes))
    }
}
