//! Test utilities for building packages, PE images and signatures.
//!
//! This module provides reusable helpers for creating in-memory `.nupkg`
//! archives and signed fixtures, shared by unit tests, integration tests
//! and the CLI tests.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O or encoding errors since
//! they are designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use x509_cert::Certificate;

use crate::archive::SIGNATURE_FILE;
use crate::signature::DigestAlgorithm;
use crate::signature::pe::WIN_CERT_REVISION_2_0;

fn file_options() -> zip::write::SimpleFileOptions {
    zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644)
}

/// Creates an in-memory ZIP archive from a list of entries.
///
/// Each entry is a tuple of (path, content). Files are stored uncompressed
/// with a fixed timestamp, so equal input yields byte-identical archives.
///
/// # Examples
///
/// ```
/// use nupkg_verify_core::test_utils::create_test_zip;
///
/// let zip_data = create_test_zip(vec![("file.txt", b"hello"), ("dir/nested.txt", b"world")]);
/// ```
#[must_use]
pub fn create_test_zip(entries: Vec<(&str, &[u8])>) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (path, data) in entries {
        zip.start_file(path, file_options()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Rewrites the end of a comment-less archive into Zip64 form: a Zip64 end
/// record and locator are inserted, and the classic end record keeps only
/// the saturated marker values.
#[must_use]
pub fn to_zip64(mut bytes: Vec<u8>) -> Vec<u8> {
    let end = bytes.len() - 22;
    assert_eq!(bytes[end..end + 4], 0x0605_4b50u32.to_le_bytes());
    let entries = u64::from(u16::from_le_bytes([bytes[end + 10], bytes[end + 11]]));
    let size = u64::from(u32::from_le_bytes(bytes[end + 12..end + 16].try_into().unwrap()));
    let offset = u64::from(u32::from_le_bytes(bytes[end + 16..end + 20].try_into().unwrap()));
    bytes.truncate(end);

    let record = end as u64;
    bytes.extend_from_slice(&0x0606_4b50u32.to_le_bytes());
    bytes.extend_from_slice(&44u64.to_le_bytes());
    bytes.extend_from_slice(&45u16.to_le_bytes());
    bytes.extend_from_slice(&45u16.to_le_bytes());
    bytes.extend_from_slice(&[0; 8]);
    for value in [entries, entries, size, offset] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    bytes.extend_from_slice(&0x0706_4b50u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&record.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());

    bytes.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    bytes.extend_from_slice(&[0; 4]);
    bytes.extend_from_slice(&[0xff; 12]);
    bytes.extend_from_slice(&[0; 2]);
    bytes
}

/// Builder for `.nupkg` test archives.
///
/// Generates the `.nuspec` manifest and OPC packaging parts, and can sign
/// the result the way NuGet does: hash the finished unsigned archive, then
/// append `.signature.p7s` as the last entry.
///
/// # Examples
///
/// ```
/// use nupkg_verify_core::test_utils::NupkgBuilder;
///
/// let bytes = NupkgBuilder::new("Demo", "1.0.0")
///     .metadata("title", "Demo package")
///     .add_file("lib/net45/Demo.dll", b"MZ")
///     .build();
/// assert!(!bytes.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct NupkgBuilder {
    id: String,
    version: String,
    metadata: Vec<(String, String)>,
    nuspec: Option<String>,
    files: Vec<(String, Vec<u8>)>,
    signature: Option<PackageSignature>,
    zip64: bool,
}

#[derive(Debug, Clone)]
enum PackageSignature {
    Generated(Option<Certificate>),
    Raw(Vec<u8>),
}

impl NupkgBuilder {
    /// Starts a package with the given id and version.
    #[must_use]
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            metadata: vec![
                ("authors".into(), "Test".into()),
                ("description".into(), "Test package".into()),
            ],
            nuspec: None,
            files: Vec::new(),
            signature: None,
            zip64: false,
        }
    }

    /// Sets a `<metadata>` child element, replacing an earlier value.
    #[must_use]
    pub fn metadata(mut self, element: &str, value: &str) -> Self {
        self.metadata.retain(|(name, _)| name != element);
        self.metadata.push((element.to_string(), value.to_string()));
        self
    }

    /// Changes the package version.
    #[must_use]
    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Removes a `<metadata>` child element.
    #[must_use]
    pub fn without_metadata(mut self, element: &str) -> Self {
        self.metadata.retain(|(name, _)| name != element);
        self
    }

    /// Replaces the generated manifest with raw XML.
    #[must_use]
    pub fn nuspec(mut self, xml: &str) -> Self {
        self.nuspec = Some(xml.to_string());
        self
    }

    /// Adds a package file; `name` uses `/` separators as in the archive.
    #[must_use]
    pub fn add_file(mut self, name: &str, data: &[u8]) -> Self {
        self.files.push((name.to_string(), data.to_vec()));
        self
    }

    /// Drops every package file named `name`.
    #[must_use]
    pub fn without_file(mut self, name: &str) -> Self {
        self.files.retain(|(existing, _)| existing != name);
        self
    }

    /// Leaves the package unsigned.
    #[must_use]
    pub fn without_signature(mut self) -> Self {
        self.signature = None;
        self
    }

    /// Signs the package. Without a certificate the signer cannot be
    /// resolved.
    #[must_use]
    pub fn signed(mut self, certificate: Option<Certificate>) -> Self {
        self.signature = Some(PackageSignature::Generated(certificate));
        self
    }

    /// Appends `blob` verbatim as `.signature.p7s`.
    #[must_use]
    pub fn signature_blob(mut self, blob: Vec<u8>) -> Self {
        self.signature = Some(PackageSignature::Raw(blob));
        self
    }

    /// Writes Zip64 end records, before and after signing.
    #[must_use]
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    /// The `.nuspec` document that will be written.
    #[must_use]
    pub fn manifest(&self) -> String {
        if let Some(xml) = &self.nuspec {
            return xml.clone();
        }
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <package xmlns=\"http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd\">\n  \
             <metadata>\n",
        );
        xml.push_str(&format!("    <id>{}</id>\n", escape(&self.id)));
        xml.push_str(&format!("    <version>{}</version>\n", escape(&self.version)));
        for (name, value) in &self.metadata {
            xml.push_str(&format!("    <{name}>{}</{name}>\n", escape(value)));
        }
        xml.push_str("  </metadata>\n</package>\n");
        xml
    }

    /// Builds the archive bytes.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let manifest = self.manifest();
        let manifest_name = format!("{}.nuspec", self.id);
        let mut entries: Vec<(&str, &[u8])> = vec![
            ("_rels/.rels", RELS.as_bytes()),
            (manifest_name.as_str(), manifest.as_bytes()),
        ];
        entries.extend(self.files.iter().map(|(name, data)| (name.as_str(), data.as_slice())));
        entries.push(("[Content_Types].xml", CONTENT_TYPES.as_bytes()));

        let blob = match &self.signature {
            None => return self.archive(entries),
            Some(PackageSignature::Raw(blob)) => blob.clone(),
            Some(PackageSignature::Generated(certificate)) => {
                let unsigned = self.archive(entries.clone());
                let hash = BASE64_STANDARD.encode(DigestAlgorithm::Sha256.digest(&unsigned));
                let content =
                    format!("Version:1\r\n\r\n2.16.840.1.101.3.4.2.1-Hash:{hash}\r\n\r\n");
                let mut builder = signing::SignedDataBuilder::data(content.as_bytes());
                if let Some(certificate) = certificate {
                    builder = builder.certificate(certificate.clone());
                }
                builder.build()
            }
        };
        entries.push((SIGNATURE_FILE, blob.as_slice()));
        self.archive(entries)
    }

    fn archive(&self, entries: Vec<(&str, &[u8])>) -> Vec<u8> {
        let bytes = create_test_zip(entries);
        if self.zip64 { to_zip64(bytes) } else { bytes }
    }

    /// Writes `<id>.<version>.nupkg` into `dir` and returns its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(format!("{}.{}.nupkg", self.id, self.version));
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

const RELS: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\" />";

const CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\" />";

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A minimal one-section PE image (0x400 bytes), PE32 or PE32+.
#[must_use]
pub fn pe_image(pe32_plus: bool) -> Vec<u8> {
    let mut image = vec![0u8; 0x400];
    image[..2].copy_from_slice(b"MZ");
    image[0x3c..0x40].copy_from_slice(&0x40u32.to_le_bytes());
    image[0x40..0x44].copy_from_slice(b"PE\0\0");

    let (machine, optional_size, magic, characteristics): (u16, u16, u16, u16) = if pe32_plus {
        (0x8664, 240, 0x20b, 0x2022)
    } else {
        (0x014c, 224, 0x10b, 0x2102)
    };
    let coff = 0x44;
    image[coff..coff + 2].copy_from_slice(&machine.to_le_bytes());
    image[coff + 2..coff + 4].copy_from_slice(&1u16.to_le_bytes());
    image[coff + 16..coff + 18].copy_from_slice(&optional_size.to_le_bytes());
    image[coff + 18..coff + 20].copy_from_slice(&characteristics.to_le_bytes());

    let optional = coff + 20;
    image[optional..optional + 2].copy_from_slice(&magic.to_le_bytes());
    image[optional + 32..optional + 36].copy_from_slice(&0x1000u32.to_le_bytes());
    image[optional + 36..optional + 40].copy_from_slice(&0x200u32.to_le_bytes());
    image[optional + 56..optional + 60].copy_from_slice(&0x2000u32.to_le_bytes());
    image[optional + 60..optional + 64].copy_from_slice(&0x200u32.to_le_bytes());
    let count = optional + if pe32_plus { 108 } else { 92 };
    image[count..count + 4].copy_from_slice(&16u32.to_le_bytes());

    let section = optional + usize::from(optional_size);
    image[section..section + 8].copy_from_slice(b".text\0\0\0");
    image[section + 8..section + 12].copy_from_slice(&0x10u32.to_le_bytes());
    image[section + 12..section + 16].copy_from_slice(&0x1000u32.to_le_bytes());
    image[section + 16..section + 20].copy_from_slice(&0x200u32.to_le_bytes());
    image[section + 20..section + 24].copy_from_slice(&0x200u32.to_le_bytes());

    image[0x200..0x206].copy_from_slice(&[0x55, 0x8b, 0xec, 0x5d, 0xc3, 0x90]);
    image
}

/// Offset of the security entry in the optional header data directories.
#[must_use]
pub fn security_directory_offset(image: &[u8]) -> usize {
    let header = goblin::pe::header::Header::parse(image).unwrap();
    let optional = header.dos_header.pe_pointer as usize + 24;
    let magic = header.optional_header.unwrap().standard_fields.magic;
    let directories = optional + if magic == 0x20b { 112 } else { 96 };
    directories + 4 * 8
}

/// Appends an attribute certificate table and points the security
/// directory at it. Each entry is `(wCertificateType, bCertificate)`.
#[must_use]
pub fn append_certificate_table(mut image: Vec<u8>, entries: &[(u16, &[u8])]) -> Vec<u8> {
    let directory = security_directory_offset(&image);
    image.resize(image.len().next_multiple_of(8), 0);
    let table_offset = image.len();
    for (certificate_type, data) in entries {
        let length = u32::try_from(8 + data.len()).unwrap();
        image.extend_from_slice(&length.to_le_bytes());
        image.extend_from_slice(&WIN_CERT_REVISION_2_0.to_le_bytes());
        image.extend_from_slice(&certificate_type.to_le_bytes());
        image.extend_from_slice(data);
        image.resize(image.len().next_multiple_of(8), 0);
    }
    let table_size = u32::try_from(image.len() - table_offset).unwrap();
    let table_offset = u32::try_from(table_offset).unwrap();
    image[directory..directory + 4].copy_from_slice(&table_offset.to_le_bytes());
    image[directory + 4..directory + 8].copy_from_slice(&table_size.to_le_bytes());
    image
}

/// CMS fixtures. The signature value is a placeholder; only the structure,
/// digests and embedded certificates are meaningful.
pub mod signing {
    use std::str::FromStr;
    use std::time::Duration;

    use cms::cert::CertificateChoices;
    use cms::cert::IssuerAndSerialNumber;
    use cms::content_info::CmsVersion;
    use cms::content_info::ContentInfo;
    use cms::signed_data::CertificateSet;
    use cms::signed_data::EncapsulatedContentInfo;
    use cms::signed_data::SignedData;
    use cms::signed_data::SignerIdentifier;
    use cms::signed_data::SignerInfo;
    use cms::signed_data::SignerInfos;
    use der::Any;
    use der::Decode;
    use der::Encode;
    use der::asn1::BitString;
    use der::asn1::ObjectIdentifier;
    use der::asn1::OctetString;
    use der::asn1::SetOfVec;
    use der::asn1::UtcTime;
    use x509_cert::Certificate;
    use x509_cert::attr::Attribute;
    use x509_cert::certificate::TbsCertificate;
    use x509_cert::certificate::Version;
    use x509_cert::name::Name;
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::spki::AlgorithmIdentifierOwned;
    use x509_cert::spki::SubjectPublicKeyInfoOwned;
    use x509_cert::time::Time;
    use x509_cert::time::Validity;

    use crate::signature::DigestAlgorithm;
    use crate::signature::digest::ID_SHA256;
    use crate::signature::pe::PeImage;
    use crate::signature::pe::WIN_CERT_TYPE_PKCS_SIGNED_DATA;
    use crate::signature::pkcs7::DigestInfo;
    use crate::signature::pkcs7::ID_CONTENT_TYPE;
    use crate::signature::pkcs7::ID_DATA;
    use crate::signature::pkcs7::ID_MESSAGE_DIGEST;
    use crate::signature::pkcs7::ID_SIGNED_DATA;
    use crate::signature::pkcs7::SPC_INDIRECT_DATA;
    use crate::signature::pkcs7::SPC_NESTED_SIGNATURE;
    use crate::signature::pkcs7::SPC_PE_IMAGE_DATA;
    use crate::signature::pkcs7::SpcAttributeTypeAndOptionalValue;
    use crate::signature::pkcs7::SpcIndirectDataContent;

    const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
    const SHA256_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
    const TEST_ISSUER: &str = "CN=Test Code Signing PCA";

    fn any<T: Encode>(value: &T) -> Any {
        Any::from_der(&value.to_der().unwrap()).unwrap()
    }

    fn algorithm(oid: ObjectIdentifier) -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        }
    }

    fn serial_number() -> SerialNumber {
        SerialNumber::new(&[0x33, 0x00, 0x01]).unwrap()
    }

    /// A structurally valid certificate issued by a fixed test issuer.
    #[must_use]
    pub fn test_certificate(subject: &str) -> Certificate {
        let issued = UtcTime::from_unix_duration(Duration::from_secs(1_700_000_000)).unwrap();
        let time = Time::UtcTime(issued);
        Certificate {
            tbs_certificate: TbsCertificate {
                version: Version::V3,
                serial_number: serial_number(),
                signature: algorithm(SHA256_WITH_RSA),
                issuer: Name::from_str(TEST_ISSUER).unwrap(),
                validity: Validity {
                    not_before: time,
                    not_after: time,
                },
                subject: Name::from_str(subject).unwrap(),
                subject_public_key_info: SubjectPublicKeyInfoOwned {
                    algorithm: algorithm(RSA_ENCRYPTION),
                    subject_public_key: BitString::from_bytes(&[0u8; 16]).unwrap(),
                },
                issuer_unique_id: None,
                subject_unique_id: None,
                extensions: None,
            },
            signature_algorithm: algorithm(SHA256_WITH_RSA),
            signature: BitString::from_bytes(&[0u8; 16]).unwrap(),
        }
    }

    /// Builds a DER `ContentInfo` holding `SignedData` with one signer.
    #[derive(Debug, Clone)]
    pub struct SignedDataBuilder {
        content_type: ObjectIdentifier,
        content: Any,
        digest_oid: ObjectIdentifier,
        message_digest: Option<Vec<u8>>,
        certificate: Option<Certificate>,
        nested: Option<Vec<u8>>,
    }

    impl SignedDataBuilder {
        fn new(content_type: ObjectIdentifier, content: Any) -> Self {
            Self {
                content_type,
                content,
                digest_oid: ID_SHA256,
                message_digest: None,
                certificate: None,
                nested: None,
            }
        }

        /// `id-data` content.
        #[must_use]
        pub fn data(content: &[u8]) -> Self {
            Self::new(ID_DATA, any(&OctetString::new(content).unwrap()))
        }

        /// Authenticode `SpcIndirectDataContent` content.
        #[must_use]
        pub fn indirect(content: &SpcIndirectDataContent) -> Self {
            Self::new(SPC_INDIRECT_DATA, any(content))
        }

        /// Embeds the signer certificate.
        #[must_use]
        pub fn certificate(mut self, certificate: Certificate) -> Self {
            self.certificate = Some(certificate);
            self
        }

        /// Overrides the signer digest algorithm.
        #[must_use]
        pub fn digest_oid(mut self, oid: ObjectIdentifier) -> Self {
            self.digest_oid = oid;
            self
        }

        /// Overrides the `messageDigest` attribute value.
        #[must_use]
        pub fn message_digest(mut self, digest: Vec<u8>) -> Self {
            self.message_digest = Some(digest);
            self
        }

        /// Attaches a nested signature (a DER `ContentInfo`).
        #[must_use]
        pub fn nested(mut self, content_info: Vec<u8>) -> Self {
            self.nested = Some(content_info);
            self
        }

        /// Encodes the `ContentInfo`.
        #[must_use]
        pub fn build(self) -> Vec<u8> {
            let digest = self.message_digest.unwrap_or_else(|| {
                DigestAlgorithm::from_oid(&self.digest_oid)
                    .map_or_else(|| vec![0u8; 16], |alg| alg.digest(self.content.value()))
            });
            let signed_attrs = SetOfVec::try_from(vec![
                Attribute {
                    oid: ID_CONTENT_TYPE,
                    values: SetOfVec::try_from(vec![any(&self.content_type)]).unwrap(),
                },
                Attribute {
                    oid: ID_MESSAGE_DIGEST,
                    values: SetOfVec::try_from(vec![any(&OctetString::new(digest).unwrap())])
                        .unwrap(),
                },
            ])
            .unwrap();
            let unsigned_attrs = self.nested.map(|nested| {
                SetOfVec::try_from(vec![Attribute {
                    oid: SPC_NESTED_SIGNATURE,
                    values: SetOfVec::try_from(vec![Any::from_der(&nested).unwrap()]).unwrap(),
                }])
                .unwrap()
            });

            let (issuer, serial_number) = self.certificate.as_ref().map_or_else(
                || (Name::from_str(TEST_ISSUER).unwrap(), serial_number()),
                |certificate| {
                    (
                        certificate.tbs_certificate.issuer.clone(),
                        certificate.tbs_certificate.serial_number.clone(),
                    )
                },
            );
            let signer = SignerInfo {
                version: CmsVersion::V1,
                sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                    issuer,
                    serial_number,
                }),
                digest_alg: algorithm(self.digest_oid),
                signed_attrs: Some(signed_attrs),
                signature_algorithm: algorithm(RSA_ENCRYPTION),
                signature: OctetString::new(vec![0u8; 64]).unwrap(),
                unsigned_attrs,
            };

            let signed_data = SignedData {
                version: CmsVersion::V1,
                digest_algorithms: SetOfVec::try_from(vec![algorithm(self.digest_oid)]).unwrap(),
                encap_content_info: EncapsulatedContentInfo {
                    econtent_type: self.content_type,
                    econtent: Some(self.content),
                },
                certificates: self.certificate.map(|certificate| {
                    CertificateSet(
                        SetOfVec::try_from(vec![CertificateChoices::Certificate(certificate)])
                            .unwrap(),
                    )
                }),
                crls: None,
                signer_infos: SignerInfos(SetOfVec::try_from(vec![signer]).unwrap()),
            };
            ContentInfo {
                content_type: ID_SIGNED_DATA,
                content: any(&signed_data),
            }
            .to_der()
            .unwrap()
        }
    }

    /// Authenticode-signs `image` with a SHA-256 image digest.
    #[must_use]
    pub fn sign_pe(image: Vec<u8>, certificate: Option<Certificate>) -> Vec<u8> {
        let digest = PeImage::parse(&image).unwrap().image_digest(DigestAlgorithm::Sha256);
        let content = SpcIndirectDataContent {
            data: SpcAttributeTypeAndOptionalValue {
                value_type: SPC_PE_IMAGE_DATA,
                value: None,
            },
            message_digest: DigestInfo {
                digest_algorithm: algorithm(ID_SHA256),
                digest: OctetString::new(digest).unwrap(),
            },
        };
        let mut builder = SignedDataBuilder::indirect(&content);
        if let Some(certificate) = certificate {
            builder = builder.certificate(certificate);
        }
        super::append_certificate_table(
            image,
            &[(WIN_CERT_TYPE_PKCS_SIGNED_DATA, builder.build().as_slice())],
        )
    }

    /// A minimal PE32 image, Authenticode-signed by `subject`.
    #[must_use]
    pub fn signed_pe(subject: &str) -> Vec<u8> {
        sign_pe(super::pe_image(false), Some(test_certificate(subject)))
    }
}
