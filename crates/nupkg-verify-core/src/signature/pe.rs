//! PE images as seen by Authenticode.
//!
//! Parsing is done by `goblin`, which also walks the attribute certificate
//! table and yields the byte ranges covered by the Authenticode image hash
//! (the whole file minus the checksum field, the security directory entry
//! and the certificate table).

use goblin::pe::PE;
use goblin::pe::certificate_table::AttributeCertificateType;
use goblin::pe::header::Header;

use super::digest::DigestAlgorithm;

/// `WIN_CERT_REVISION_2_0`
pub const WIN_CERT_REVISION_2_0: u16 = 0x0200;
/// `WIN_CERT_TYPE_PKCS_SIGNED_DATA`
pub const WIN_CERT_TYPE_PKCS_SIGNED_DATA: u16 = 0x0002;

/// Why a file could not be read as a signable PE image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeError {
    /// The headers are not those of a PE image.
    NotPe,
    /// The headers parse but the rest of the image, typically the
    /// certificate table, does not.
    Malformed(String),
}

/// A parsed PE image.
pub struct PeImage<'a> {
    pe: PE<'a>,
}

impl std::fmt::Debug for PeImage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeImage")
            .field("is_64", &self.pe.is_64)
            .field("certificates", &self.pe.certificates.len())
            .finish_non_exhaustive()
    }
}

impl<'a> PeImage<'a> {
    /// Parses `bytes`.
    ///
    /// # Errors
    ///
    /// [`PeError::NotPe`] when the DOS, COFF or optional header is missing
    /// or invalid; [`PeError::Malformed`] when the headers are fine but the
    /// image body is not.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, PeError> {
        match PE::parse(bytes) {
            Ok(pe) => Ok(Self { pe }),
            Err(error) if Header::parse(bytes).is_ok() => {
                Err(PeError::Malformed(error.to_string()))
            }
            Err(_) => Err(PeError::NotPe),
        }
    }

    /// Whether the image is PE32+.
    #[must_use]
    pub const fn is_64(&self) -> bool {
        self.pe.is_64
    }

    /// Whether the security directory points at any certificate.
    #[must_use]
    pub fn has_certificate_table(&self) -> bool {
        !self.pe.certificates.is_empty()
    }

    /// `bCertificate` of every PKCS#7 `SignedData` entry, in table order.
    /// Entries of other types are skipped.
    pub fn signed_data(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.pe
            .certificates
            .iter()
            .filter(|entry| {
                matches!(entry.certificate_type, AttributeCertificateType::PkcsSignedData)
            })
            .map(|entry| entry.certificate)
    }

    /// Authenticode image hash.
    #[must_use]
    pub fn image_digest(&self, algorithm: DigestAlgorithm) -> Vec<u8> {
        let mut hasher = algorithm.hasher();
        for range in self.pe.authenticode_ranges() {
            hasher.update(range);
        }
        hasher.finalize().into_vec()
    }
}
