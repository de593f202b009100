//! NuGet package archive reader.
//!
//! A `.nupkg` is a zip archive laid out as an OPC package: the `.nuspec`
//! manifest at the root, packaging parts (`[Content_Types].xml`, `_rels/`,
//! `package/`), an optional `.signature.p7s` package signature, and the
//! package files proper. Only the latter are exposed as [`PackageFile`]s.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use crate::Result;
use crate::VerifyError;
use crate::formats::PackageMetadata;
use crate::formats::parse_nuspec;

/// Name of the package signature entry at the archive root.
pub const SIGNATURE_FILE: &str = ".signature.p7s";

/// One package file inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    index: usize,
    path: String,
}

impl PackageFile {
    /// Package-relative path with `\` separators, e.g. `lib\net45\A.dll`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('\\').next().unwrap_or(&self.path)
    }

    /// Extension of the file name including the dot, or `""`.
    #[must_use]
    pub fn extension(&self) -> &str {
        extension_of(&self.path)
    }
}

/// Returns the extension of the last component of a package path, including
/// the leading dot; `""` when there is none.
///
/// # Examples
///
/// ```
/// use nupkg_verify_core::archive::extension_of;
///
/// assert_eq!(extension_of(r"lib\net45\A.Client.dll"), ".dll");
/// assert_eq!(extension_of(r"lib\net45\README"), "");
/// assert_eq!(extension_of(r"lib\v1.0\README"), "");
/// ```
#[must_use]
pub fn extension_of(path: &str) -> &str {
    let name = path.rsplit(['\\', '/']).next().unwrap_or(path);
    name.rfind('.').map_or("", |dot| &name[dot..])
}

enum EntryKind {
    Directory,
    Manifest,
    Signature,
    Packaging,
    Content(String),
}

fn classify(name: &str) -> EntryKind {
    if name.ends_with('/') {
        return EntryKind::Directory;
    }
    let lower = name.to_ascii_lowercase();
    if lower == "[content_types].xml"
        || lower.starts_with("_rels/")
        || lower.starts_with("package/")
    {
        EntryKind::Packaging
    } else if is_signature_entry(name) {
        EntryKind::Signature
    } else if !lower.contains('/') && lower.ends_with(".nuspec") {
        EntryKind::Manifest
    } else {
        EntryKind::Content(percent_decode(name).replace('/', "\\"))
    }
}

fn percent_decode(name: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(name.as_bytes())).into_owned()
}

/// Whether an archive entry name is the package signature.
#[must_use]
pub fn is_signature_entry(name: &str) -> bool {
    name.eq_ignore_ascii_case(SIGNATURE_FILE)
}

/// An opened NuGet package.
///
/// # Examples
///
/// ```no_run
/// use nupkg_verify_core::archive::NuGetPackage;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let package = NuGetPackage::open("Microsoft.Identity.Client.2.7.0.nupkg")?;
/// println!("{}", package.metadata().full_name());
/// for file in package.files() {
///     println!("{}", file.path());
/// }
/// # Ok(())
/// # }
/// ```
pub struct NuGetPackage {
    path: PathBuf,
    archive: zip::ZipArchive<BufReader<File>>,
    metadata: PackageMetadata,
    files: Vec<PackageFile>,
    has_signature: bool,
}

impl std::fmt::Debug for NuGetPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NuGetPackage")
            .field("path", &self.path)
            .field("id", &self.metadata.id)
            .field("files", &self.files.len())
            .field("has_signature", &self.has_signature)
            .finish_non_exhaustive()
    }
}

impl NuGetPackage {
    /// Opens the archive and reads its manifest.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not a zip archive, or has no
    /// parsable `.nuspec` at its root.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file))
            .map_err(|e| VerifyError::InvalidArchive(format!("failed to open ZIP archive: {e}")))?;

        let mut files = Vec::new();
        let mut manifest_index = None;
        let mut has_signature = false;

        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(|e| {
                VerifyError::InvalidArchive(format!("failed to read ZIP entry: {e}"))
            })?;
            if entry.is_dir() {
                continue;
            }
            match classify(entry.name()) {
                EntryKind::Content(path) => files.push(PackageFile { index, path }),
                EntryKind::Manifest if manifest_index.is_none() => manifest_index = Some(index),
                EntryKind::Signature => has_signature = true,
                EntryKind::Manifest | EntryKind::Directory | EntryKind::Packaging => {}
            }
        }

        let manifest_index = manifest_index.ok_or(VerifyError::MissingManifest)?;
        let mut xml = String::new();
        archive
            .by_index(manifest_index)
            .map_err(|e| VerifyError::InvalidArchive(format!("failed to read manifest: {e}")))?
            .read_to_string(&mut xml)
            .map_err(|e| VerifyError::InvalidManifest(e.to_string()))?;
        let metadata = parse_nuspec(&xml)?;

        tracing::info!(
            package = %path.display(),
            id = %metadata.id,
            version = %metadata.version,
            files = files.len(),
            "opened package"
        );

        Ok(Self {
            path,
            archive,
            metadata,
            files,
            has_signature,
        })
    }

    /// Path the package was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Manifest metadata.
    #[must_use]
    pub const fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    /// Package files in archive enumeration order.
    #[must_use]
    pub fn files(&self) -> &[PackageFile] {
        &self.files
    }

    /// Whether the archive carries a `.signature.p7s` entry.
    #[must_use]
    pub const fn has_signature(&self) -> bool {
        self.has_signature
    }

    /// Opens a decompressing reader over one package file.
    pub fn open_file(&mut self, file: &PackageFile) -> Result<impl Read + '_> {
        self.archive.by_index(file.index).map_err(|e| {
            VerifyError::InvalidArchive(format!("failed to read '{}': {e}", file.path))
        })
    }

    /// Consumes the package, keeping only its metadata.
    #[must_use]
    pub fn into_metadata(self) -> PackageMetadata {
        self.metadata
    }
}
