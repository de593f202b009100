//! Scoped materialization of archive entries on disk.
//!
//! Signature inspection works on file paths, so each package entry is copied
//! into a uniquely named transient file first. The file lives exactly as
//! long as the [`TemporaryFile`] value.

use std::io::Read;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::Result;

const TEMP_PREFIX: &str = "nupkg-verify-";

/// A transient copy of a stream, removed from disk on drop.
///
/// # Examples
///
/// ```
/// use nupkg_verify_core::io::TemporaryFile;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let data: &[u8] = b"MZ...";
/// let temp = TemporaryFile::from_reader(data, ".dll")?;
/// assert_eq!(temp.len(), 5);
/// assert!(temp.path().to_string_lossy().ends_with(".dll"));
/// let path = temp.path().to_path_buf();
/// drop(temp);
/// assert!(!path.exists());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TemporaryFile {
    file: NamedTempFile,
    len: u64,
}

impl TemporaryFile {
    /// Copies the full contents of `reader` into a new transient file whose
    /// name ends with `suffix` (for example `".dll"`; may be empty).
    ///
    /// If the copy fails the partially written file is removed before the
    /// error is returned.
    pub fn from_reader<R: Read>(mut reader: R, suffix: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(suffix)
            .tempfile()?;

        let len = std::io::copy(&mut reader, file.as_file_mut())?;
        file.as_file_mut().flush()?;

        Ok(Self { file, len })
    }

    /// Location of the transient file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of bytes copied from the source stream.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the source stream was empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}
