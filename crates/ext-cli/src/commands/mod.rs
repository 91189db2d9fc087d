//! Command implementations for ext-cli

pub mod inspect;
pub mod order;
pub mod scan;

pub use inspect::run_inspect;
pub use order::run_order;
pub use scan::run_scan;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ext_archive::{ExtensionMetadata, ZipPackage};
use ext_runtime::LoaderConfig;

use crate::cli::Source;
use crate::error::Result;

/// One archive found in the extensions directory.
pub struct ScannedArchive {
    pub file: PathBuf,
    /// Metadata, or the reason discovery would reject the archive.
    pub outcome: std::result::Result<ExtensionMetadata, String>,
}

/// Resolve the loader configuration from `--config` and `--dir`.
pub fn load_config(source: &Source) -> Result<LoaderConfig> {
    let mut config = match &source.config {
        Some(path) => LoaderConfig::load(path)?,
        None => LoaderConfig::default(),
    };
    if let Some(dir) = &source.dir {
        config.extensions_dir = dir.clone();
    }
    Ok(config)
}

/// Read the metadata of every archive in the configured directory, in
/// file-name order, applying the same checks as discovery.
pub fn read_directory(config: &LoaderConfig) -> Result<Vec<ScannedArchive>> {
    let files = ext_archive::scan_directory(&config.extensions_dir, &config.archive_suffix)?;
    let mut seen = HashSet::new();

    Ok(files
        .into_iter()
        .map(|file| {
            let outcome = read_metadata(&file, &config.metadata_entry).and_then(|metadata| {
                if seen.insert(ext_archive::name_key(&metadata.name)) {
                    Ok(metadata)
                } else {
                    Err(format!("an extension named '{}' is already present", metadata.name))
                }
            });
            if let Err(reason) = &outcome {
                tracing::debug!(file = %file.display(), reason = %reason, "Archive rejected");
            }
            ScannedArchive { file, outcome }
        })
        .collect())
}

fn read_metadata(file: &Path, entry: &str) -> std::result::Result<ExtensionMetadata, String> {
    let mut archive = ZipPackage::open(file).map_err(|e| e.to_string())?;
    ExtensionMetadata::from_archive(&mut archive, entry).map_err(|e| e.to_string())
}
