//! Directory scanning and archive fingerprints.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// List the archive files directly inside `dir` whose name ends with
/// `suffix` (case-insensitive), sorted by file name.
///
/// A missing directory is not an error: it simply holds no archives.
pub fn scan_directory(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        tracing::warn!("Extension directory does not exist: {}", dir.display());
        return Ok(Vec::new());
    }

    let suffix = suffix.to_ascii_lowercase();
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    let mut archives: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_ascii_lowercase().ends_with(&suffix))
                .unwrap_or(false)
        })
        .collect();
    archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    tracing::debug!(
        "Found {} archive(s) in {}",
        archives.len(),
        dir.display()
    );
    Ok(archives)
}

/// SHA-256 of the archive file, hex encoded.
pub fn archive_checksum(path: &Path) -> Result<String> {
    let content = fs::read(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_scan_filters_by_suffix_and_sorts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("zeta.ext"), b"").unwrap();
        fs::write(dir.path().join("alpha.EXT"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("folder.ext")).unwrap();

        let found = scan_directory(dir.path(), ".ext").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["alpha.EXT", "zeta.ext"]);
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let found = scan_directory(&dir.path().join("absent"), ".ext").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_checksum_is_stable_hex() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.ext");
        fs::write(&path, b"abc").unwrap();

        let sum = archive_checksum(&path).unwrap();
        assert_eq!(
            sum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
