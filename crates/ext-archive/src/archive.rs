//! Archive container access.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{Error, Result};

/// Read access to the entries of a package archive.
///
/// Implementations need `&mut self` to read because zip readers seek the
/// underlying file; callers that share an archive wrap it in a mutex.
pub trait Archive: Send {
    /// Path the archive was opened from.
    fn path(&self) -> &Path;

    /// Read an entry fully into memory. Missing entries and directories
    /// yield `Ok(None)`.
    fn read_entry(&mut self, entry: &str) -> Result<Option<Vec<u8>>>;

    /// Names of all entries, in archive order.
    fn entry_names(&self) -> Vec<String>;
}

/// A zip-backed package archive.
pub struct ZipPackage {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl ZipPackage {
    /// Open a zip archive from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let archive = ZipArchive::new(file).map_err(|e| Error::zip(&path, e))?;
        Ok(Self { path, archive })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }
}

impl Archive for ZipPackage {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_entry(&mut self, entry: &str) -> Result<Option<Vec<u8>>> {
        let mut file = match self.archive.by_name(entry) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(Error::zip(&self.path, e)),
        };

        if file.is_dir() {
            return Ok(None);
        }

        let mut bytes = Vec::with_capacity(initial_capacity(file.size()));
        file.read_to_end(&mut bytes)
            .map_err(|e| Error::io(&self.path, e))?;
        Ok(Some(bytes))
    }

    fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }
}

/// Largest buffer reserved up front for one entry.
const MAX_PREALLOCATION: usize = 1 << 20;

/// Buffer size to reserve for an entry whose header declares `declared`
/// bytes. The header is archive-controlled, so the reservation is capped and
/// `read_to_end` grows the buffer for anything larger.
fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOCATION, |size| size.clamp(32, MAX_PREALLOCATION))
}

impl std::fmt::Debug for ZipPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipPackage")
            .field("path", &self.path)
            .field("entries", &self.archive.len())
            .finish()
    }
}
