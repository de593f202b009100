//! NuGet package signatures.
//!
//! A signed package carries a CMS `SignedData` blob in the stored root entry
//! `.signature.p7s`, written last both in the local entries and in the
//! central directory. Its content is a small text document:
//!
//! ```text
//! Version:1
//!
//! 2.16.840.1.101.3.4.2.1-Hash:<base64 digest>
//! ```
//!
//! The digest covers the archive as it was before the signature entry was
//! appended. That archive is reconstructed on the fly from the signed one:
//! every local entry before the signature, the remaining central directory
//! records, and the end records (Zip64 ones included) with the signature
//! removed from their counts, sizes and offsets. Entry offsets come from the
//! `zip` reader; only the end records are patched by hand.

use std::io::Cursor;
use std::io::Read;
use std::io::Seek;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use der::asn1::ObjectIdentifier;
use zip::CompressionMethod;
use zip::ZipArchive;

use super::PackageSignatureStatus;
use super::SignatureVerdict;
use super::digest::DigestAlgorithm;
use super::pkcs7;
use crate::archive::is_signature_entry;

const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const CENTRAL_HEADER_LEN: usize = 46;
const ZIP64_END_SIGNATURE: u32 = 0x0606_4b50;
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;
const ZIP64_LOCATOR_LEN: usize = 20;
const END_SIGNATURE: u32 = 0x0605_4b50;

/// Parsed NuGet signature content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureContent {
    /// Hash algorithm OID declared in the `<oid>-Hash` entry.
    pub algorithm: ObjectIdentifier,
    /// Declared hash of the unsigned package.
    pub hash: Vec<u8>,
}

/// Parses NuGet signature content. Lines may end in `\n` or `\r\n`.
#[must_use]
pub fn parse_signature_content(bytes: &[u8]) -> Option<SignatureContent> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut lines = text.lines();
    if lines.next()?.trim() != "Version:1" {
        return None;
    }
    lines
        .filter_map(|line| line.split_once(':'))
        .find_map(|(key, value)| {
            let algorithm = ObjectIdentifier::new(key.trim().strip_suffix("-Hash")?).ok()?;
            let hash = BASE64_STANDARD.decode(value.trim()).ok()?;
            Some(SignatureContent { algorithm, hash })
        })
}

/// Checks the package signature of a whole `.nupkg` held in memory.
#[must_use]
pub fn verify_package_signature(bytes: &[u8]) -> PackageSignatureStatus {
    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(error) => {
            tracing::warn!(%error, "cannot read the archive; treating package as unsigned");
            return PackageSignatureStatus::unsigned();
        }
    };
    let Some(index) = signature_index(&archive) else {
        return PackageSignatureStatus::unsigned();
    };

    let Some(layout) = SignedLayout::locate(&mut archive, bytes, index) else {
        return PackageSignatureStatus::signed(SignatureVerdict::MalformedSignature, Vec::new());
    };
    let mut blob = Vec::new();
    if archive
        .by_index(index)
        .and_then(|mut entry| Ok(entry.read_to_end(&mut blob)?))
        .is_err()
    {
        return PackageSignatureStatus::signed(SignatureVerdict::MalformedSignature, Vec::new());
    }
    let Some(signed_data) = pkcs7::decode_signed_data(&blob) else {
        return PackageSignatureStatus::signed(SignatureVerdict::MalformedSignature, Vec::new());
    };
    let records = pkcs7::signature_records(&signed_data);

    let content = if signed_data.encap_content_info.econtent_type == pkcs7::ID_DATA {
        pkcs7::encapsulated_content(&signed_data).and_then(parse_signature_content)
    } else {
        None
    };
    let Some(content) = content else {
        return PackageSignatureStatus::signed(SignatureVerdict::MalformedSignature, records);
    };
    let Some(algorithm) = DigestAlgorithm::from_oid(&content.algorithm) else {
        return PackageSignatureStatus::signed(SignatureVerdict::UnsupportedAlgorithm, records);
    };
    let Some(actual) = layout.unsigned_package_hash(bytes, algorithm) else {
        return PackageSignatureStatus::signed(SignatureVerdict::MalformedSignature, records);
    };
    if actual != content.hash {
        return PackageSignatureStatus::signed(SignatureVerdict::BadDigest, records);
    }

    PackageSignatureStatus::signed(pkcs7::verify_signer(&signed_data), records)
}

/// Digest of the package with its signature entry removed, or `None` when
/// the archive has no signature entry or does not have the signature last.
#[must_use]
pub fn unsigned_package_hash(bytes: &[u8], algorithm: DigestAlgorithm) -> Option<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).ok()?;
    let index = signature_index(&archive)?;
    SignedLayout::locate(&mut archive, bytes, index)?.unsigned_package_hash(bytes, algorithm)
}

fn signature_index<R: Read + Seek>(archive: &ZipArchive<R>) -> Option<usize> {
    (0..archive.len()).find(|&index| archive.name_for_index(index).is_some_and(is_signature_entry))
}

/// Where the signature entry sits in a signed archive.
struct SignedLayout {
    local_start: usize,
    directory_start: usize,
    central_start: usize,
    central_end: usize,
}

impl SignedLayout {
    /// The signature must be stored, and be the last entry both in the
    /// central directory and among the local entries.
    fn locate<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        bytes: &[u8],
        index: usize,
    ) -> Option<Self> {
        if archive.offset() != 0 || index + 1 != archive.len() {
            return None;
        }
        let (local_start, central_start) = {
            let entry = archive.by_index_raw(index).ok()?;
            if entry.compression() != CompressionMethod::Stored {
                return None;
            }
            (entry.header_start(), entry.central_header_start())
        };
        for other in 0..index {
            if archive.by_index_raw(other).ok()?.header_start() >= local_start {
                return None;
            }
        }

        let local_start = usize::try_from(local_start).ok()?;
        let directory_start = usize::try_from(archive.central_directory_start()).ok()?;
        let central_start = usize::try_from(central_start).ok()?;
        if read_u32(bytes, central_start)? != CENTRAL_HEADER_SIGNATURE
            || local_start >= directory_start
            || directory_start > central_start
        {
            return None;
        }
        let variable = usize::from(read_u16(bytes, central_start + 28)?)
            + usize::from(read_u16(bytes, central_start + 30)?)
            + usize::from(read_u16(bytes, central_start + 32)?);
        Some(Self {
            local_start,
            directory_start,
            central_start,
            central_end: central_start + CENTRAL_HEADER_LEN + variable,
        })
    }

    fn unsigned_package_hash(&self, bytes: &[u8], algorithm: DigestAlgorithm) -> Option<Vec<u8>> {
        let removed_local = (self.directory_start - self.local_start) as u64;
        let removed_central = (self.central_end - self.central_start) as u64;

        let mut hasher = algorithm.hasher();
        hasher.update(bytes.get(..self.local_start)?);
        hasher.update(bytes.get(self.directory_start..self.central_start)?);

        let mut position = self.central_end;
        if read_u32(bytes, position)? == ZIP64_END_SIGNATURE {
            let len = usize::try_from(read_u64(bytes, position + 4)?).ok()?.checked_add(12)?;
            let entries_on_disk = read_u64(bytes, position + 24)?.checked_sub(1)?;
            let entries = read_u64(bytes, position + 32)?.checked_sub(1)?;
            let size = read_u64(bytes, position + 40)?.checked_sub(removed_central)?;
            let offset = read_u64(bytes, position + 48)?.checked_sub(removed_local)?;
            hasher.update(bytes.get(position..position + 24)?);
            hasher.update(&entries_on_disk.to_le_bytes());
            hasher.update(&entries.to_le_bytes());
            hasher.update(&size.to_le_bytes());
            hasher.update(&offset.to_le_bytes());
            hasher.update(bytes.get(position + 56..position.checked_add(len)?)?);
            position += len;
        }
        if read_u32(bytes, position)? == ZIP64_LOCATOR_SIGNATURE {
            let record = read_u64(bytes, position + 8)?
                .checked_sub(removed_local + removed_central)?;
            hasher.update(bytes.get(position..position + 8)?);
            hasher.update(&record.to_le_bytes());
            hasher.update(bytes.get(position + 16..position + ZIP64_LOCATOR_LEN)?);
            position += ZIP64_LOCATOR_LEN;
        }
        if read_u32(bytes, position)? != END_SIGNATURE {
            return None;
        }

        // Fields saturated for Zip64 keep their marker value.
        let entries = |value: u16| {
            if value == u16::MAX { Some(value) } else { value.checked_sub(1) }
        };
        let shrink = |value: u32, by: u64| {
            if value == u32::MAX {
                Some(value)
            } else {
                u32::try_from(u64::from(value).checked_sub(by)?).ok()
            }
        };
        hasher.update(bytes.get(position..position + 8)?);
        hasher.update(&entries(read_u16(bytes, position + 8)?)?.to_le_bytes());
        hasher.update(&entries(read_u16(bytes, position + 10)?)?.to_le_bytes());
        hasher.update(&shrink(read_u32(bytes, position + 12)?, removed_central)?.to_le_bytes());
        hasher.update(&shrink(read_u32(bytes, position + 16)?, removed_local)?.to_le_bytes());
        hasher.update(bytes.get(position + 20..)?);

        Some(hasher.finalize().into_vec())
    }
}

fn le_bytes<const N: usize>(bytes: &[u8], offset: usize) -> Option<[u8; N]> {
    bytes.get(offset..offset.checked_add(N)?)?.try_into().ok()
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    le_bytes(bytes, offset).map(u16::from_le_bytes)
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    le_bytes(bytes, offset).map(u32::from_le_bytes)
}

fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    le_bytes(bytes, offset).map(u64::from_le_bytes)
}
