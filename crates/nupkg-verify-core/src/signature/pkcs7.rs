//! PKCS#7 / CMS `SignedData` handling shared by Authenticode and NuGet
//! package signatures.

use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use cms::signed_data::SignerIdentifier;
use cms::signed_data::SignerInfo;
use der::Any;
use der::Decode;
use der::Encode;
use der::Sequence;
use der::SliceReader;
use der::asn1::ObjectIdentifier;
use der::asn1::OctetString;
use x509_cert::Certificate;
use x509_cert::spki::AlgorithmIdentifierOwned;

use super::SignatureRecord;
use super::SignatureVerdict;
use super::digest::DigestAlgorithm;
use super::digest::algorithm_name;

/// `id-signedData`
pub const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
/// `id-data`
pub const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
/// `id-contentType` signed attribute.
pub const ID_CONTENT_TYPE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
/// `id-messageDigest` signed attribute.
pub const ID_MESSAGE_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
/// `SPC_INDIRECT_DATA_OBJID`
pub const SPC_INDIRECT_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.4");
/// `SPC_PE_IMAGE_DATAOBJ`
pub const SPC_PE_IMAGE_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.15");
/// `szOID_NESTED_SIGNATURE` unsigned attribute.
pub const SPC_NESTED_SIGNATURE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.4.1");
/// `id-ce-subjectKeyIdentifier`
const ID_CE_SUBJECT_KEY_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.14");

/// `SpcIndirectDataContent`, the Authenticode `eContent`.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcIndirectDataContent {
    /// Kind of data the signature covers.
    pub data: SpcAttributeTypeAndOptionalValue,
    /// Digest of the covered data.
    pub message_digest: DigestInfo,
}

/// `SpcAttributeTypeAndOptionalValue`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcAttributeTypeAndOptionalValue {
    /// Attribute type, `SPC_PE_IMAGE_DATAOBJ` for PE images.
    pub value_type: ObjectIdentifier,
    /// Type-specific value.
    #[asn1(optional = "true")]
    pub value: Option<Any>,
}

/// `DigestInfo`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct DigestInfo {
    /// Digest algorithm.
    pub digest_algorithm: AlgorithmIdentifierOwned,
    /// Digest value.
    pub digest: OctetString,
}

/// Decodes a DER `ContentInfo` wrapping `SignedData`.
///
/// Trailing bytes after the `ContentInfo` are ignored; certificate table
/// entries are padded to eight bytes.
#[must_use]
pub fn decode_signed_data(bytes: &[u8]) -> Option<SignedData> {
    let mut reader = SliceReader::new(bytes).ok()?;
    let content_info = ContentInfo::decode(&mut reader).ok()?;
    signed_data_of(&content_info)
}

fn signed_data_of(content_info: &ContentInfo) -> Option<SignedData> {
    if content_info.content_type != ID_SIGNED_DATA {
        return None;
    }
    SignedData::from_der(&content_info.content.to_der().ok()?).ok()
}

/// Raw value bytes of the encapsulated content.
///
/// For `id-data` this is the content of the OCTET STRING; for Authenticode
/// it is the body of `SpcIndirectDataContent` without its tag and length,
/// which is what `messageDigest` covers in both cases.
#[must_use]
pub fn encapsulated_content(signed_data: &SignedData) -> Option<&[u8]> {
    signed_data
        .encap_content_info
        .econtent
        .as_ref()
        .map(Any::value)
}

/// Decodes the encapsulated content as `SpcIndirectDataContent`.
#[must_use]
pub fn indirect_data(signed_data: &SignedData) -> Option<SpcIndirectDataContent> {
    if signed_data.encap_content_info.econtent_type != SPC_INDIRECT_DATA {
        return None;
    }
    let content = signed_data.encap_content_info.econtent.as_ref()?;
    SpcIndirectDataContent::from_der(&content.to_der().ok()?).ok()
}

/// Checks the primary signer of `signed_data`.
///
/// The digest algorithm must be supported, the `messageDigest` signed
/// attribute must match the encapsulated content, and the signer
/// certificate must be embedded. Chain trust and the signature value
/// itself are not evaluated.
#[must_use]
pub fn verify_signer(signed_data: &SignedData) -> SignatureVerdict {
    let Some(signer) = signed_data.signer_infos.0.iter().next() else {
        return SignatureVerdict::MalformedSignature;
    };
    let Some(algorithm) = DigestAlgorithm::from_oid(&signer.digest_alg.oid) else {
        return SignatureVerdict::UnsupportedAlgorithm;
    };
    let Some(content) = encapsulated_content(signed_data) else {
        return SignatureVerdict::MalformedSignature;
    };
    let Some(declared) = message_digest(signer) else {
        return SignatureVerdict::MalformedSignature;
    };
    if declared != algorithm.digest(content) {
        return SignatureVerdict::BadDigest;
    }
    if signer_certificate(signed_data, signer).is_none() {
        return SignatureVerdict::UnknownSigner;
    }
    SignatureVerdict::Valid
}

fn message_digest(signer: &SignerInfo) -> Option<Vec<u8>> {
    let attribute = signer
        .signed_attrs
        .as_ref()?
        .iter()
        .find(|attribute| attribute.oid == ID_MESSAGE_DIGEST)?;
    let value = attribute.values.iter().next()?;
    let digest = OctetString::from_der(&value.to_der().ok()?).ok()?;
    Some(digest.as_bytes().to_vec())
}

/// Finds the certificate identified by the signer's `sid`.
#[must_use]
pub fn signer_certificate<'a>(
    signed_data: &'a SignedData,
    signer: &SignerInfo,
) -> Option<&'a Certificate> {
    let certificates = signed_data.certificates.as_ref()?;
    certificates
        .0
        .iter()
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(certificate) => Some(certificate),
            CertificateChoices::Other(_) => None,
        })
        .find(|certificate| identifies(&signer.sid, certificate))
}

fn identifies(sid: &SignerIdentifier, certificate: &Certificate) -> bool {
    let tbs = &certificate.tbs_certificate;
    match sid {
        SignerIdentifier::IssuerAndSerialNumber(id) => {
            tbs.issuer == id.issuer && tbs.serial_number == id.serial_number
        }
        SignerIdentifier::SubjectKeyIdentifier(ski) => tbs
            .extensions
            .iter()
            .flatten()
            .filter(|extension| extension.extn_id == ID_CE_SUBJECT_KEY_IDENTIFIER)
            .filter_map(|extension| OctetString::from_der(extension.extn_value.as_bytes()).ok())
            .any(|key_id| key_id.as_bytes() == ski.0.as_bytes()),
    }
}

/// Describes every signer of `signed_data`, followed by nested signatures.
#[must_use]
pub fn signature_records(signed_data: &SignedData) -> Vec<SignatureRecord> {
    let mut records = Vec::new();
    collect_records(signed_data, false, &mut records);
    records
}

fn collect_records(signed_data: &SignedData, nested: bool, records: &mut Vec<SignatureRecord>) {
    for signer in signed_data.signer_infos.0.iter() {
        records.push(describe_signer(signed_data, signer, nested));
        for nested_signature in nested_signatures(signer) {
            collect_records(&nested_signature, true, records);
        }
    }
}

fn nested_signatures(signer: &SignerInfo) -> Vec<SignedData> {
    signer
        .unsigned_attrs
        .iter()
        .flat_map(|attributes| attributes.iter())
        .filter(|attribute| attribute.oid == SPC_NESTED_SIGNATURE)
        .flat_map(|attribute| attribute.values.iter())
        .filter_map(|value| {
            let content_info = ContentInfo::from_der(&value.to_der().ok()?).ok()?;
            signed_data_of(&content_info)
        })
        .collect()
}

fn describe_signer(signed_data: &SignedData, signer: &SignerInfo, nested: bool) -> SignatureRecord {
    let digest_algorithm = algorithm_name(&signer.digest_alg.oid);
    if let Some(certificate) = signer_certificate(signed_data, signer) {
        let tbs = &certificate.tbs_certificate;
        return SignatureRecord {
            subject: Some(tbs.subject.to_string()),
            issuer: Some(tbs.issuer.to_string()),
            serial_number: hex::encode_upper(tbs.serial_number.as_bytes()),
            digest_algorithm,
            nested,
        };
    }
    let (issuer, serial_number) = match &signer.sid {
        SignerIdentifier::IssuerAndSerialNumber(id) => (
            Some(id.issuer.to_string()),
            hex::encode_upper(id.serial_number.as_bytes()),
        ),
        SignerIdentifier::SubjectKeyIdentifier(_) => (None, String::new()),
    };
    SignatureRecord {
        subject: None,
        issuer,
        serial_number,
        digest_algorithm,
        nested,
    }
}
