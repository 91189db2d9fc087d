//! Loader configuration, optionally read from a TOML file.
//!
//! ```toml
//! extensions_dir = "plugins"
//! archive_suffix = ".ext"
//! home_base = "data/plugins"
//! reserved_namespace = "ext_runtime"
//! ```
//!
//! Every key is optional. `home_base` defaults to the extensions directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Namespace that extension archives may never define symbols in.
pub const DEFAULT_RESERVED_NAMESPACE: &str = "ext_runtime";

/// Settings for an [`ExtensionManager`](crate::ExtensionManager).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Directory scanned for extension archives.
    pub extensions_dir: PathBuf,
    /// File suffix that marks an archive, compared case-insensitively.
    pub archive_suffix: String,
    /// Parent of every extension's home directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_base: Option<PathBuf>,
    pub reserved_namespace: String,
    /// Name of the metadata entry inside each archive.
    pub metadata_entry: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions_dir: PathBuf::from("extensions"),
            archive_suffix: ext_archive::ARCHIVE_SUFFIX.to_string(),
            home_base: None,
            reserved_namespace: DEFAULT_RESERVED_NAMESPACE.to_string(),
            metadata_entry: ext_archive::METADATA_ENTRY.to_string(),
        }
    }
}

impl LoaderConfig {
    /// Configuration for the given extensions directory, defaults elsewhere.
    pub fn new(extensions_dir: impl Into<PathBuf>) -> Self {
        Self {
            extensions_dir: extensions_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_home_base(mut self, home_base: impl Into<PathBuf>) -> Self {
        self.home_base = Some(home_base.into());
        self
    }

    pub fn with_archive_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.archive_suffix = suffix.into();
        self
    }

    pub fn with_reserved_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.reserved_namespace = namespace.into();
        self
    }

    /// Base directory for extension homes.
    pub fn home_base(&self) -> &Path {
        self.home_base
            .as_deref()
            .unwrap_or(self.extensions_dir.as_path())
    }

    /// Parse configuration from TOML text. `origin` is only used in errors.
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read configuration from a TOML file.
    ///
    /// A relative `extensions_dir` or `home_base` is resolved against the
    /// directory containing the file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut config = Self::from_toml(&content, path)?;

        if let Some(parent) = path.parent() {
            if config.extensions_dir.is_relative() {
                config.extensions_dir = parent.join(&config.extensions_dir);
            }
            if let Some(home) = config.home_base.as_mut()
                && home.is_relative()
            {
                *home = parent.join(&*home);
            }
        }

        tracing::debug!(
            path = %path.display(),
            dir = %config.extensions_dir.display(),
            "Loaded loader configuration"
        );
        Ok(config)
    }
}
