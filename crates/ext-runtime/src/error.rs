//! Error types for ext-runtime

use std::path::{Path, PathBuf};

use crate::extension::{ExtensionState, HookError, Phase};

/// Errors that can occur while managing extensions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid extension configuration in {file}: missing '{missing_field}'")]
    Configuration { file: PathBuf, missing_field: String },

    #[error("Failed to load extension from {file}: {cause}")]
    Load {
        file: PathBuf,
        #[source]
        cause: LoadFailure,
    },

    #[error("An extension named '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("Extension '{name}' has not been loaded")]
    NotLoaded { name: String },

    #[error("Dependency cycle detected involving: {}", involved.join(", "))]
    DependencyCycle { involved: Vec<String> },

    #[error("Unknown extension: {0}")]
    UnknownExtension(String),

    #[error("Cannot {phase} extension '{name}' while it is {state}")]
    InvalidTransition {
        name: String,
        state: ExtensionState,
        phase: Phase,
    },

    #[error("Extension '{name}' failed during {phase}: {source}")]
    Hook {
        name: String,
        phase: Phase,
        #[source]
        source: HookError,
    },

    #[error(transparent)]
    Archive(#[from] ext_archive::Error),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid loader configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl Error {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Map archive errors on metadata to the configuration variant where the
    /// archive is readable but its descriptor is incomplete.
    pub(crate) fn from_metadata(error: ext_archive::Error) -> Self {
        match error {
            ext_archive::Error::MissingField { path, field } => Self::Configuration {
                file: path,
                missing_field: field,
            },
            ext_archive::Error::MissingMetadata { path, entry } => Self::Configuration {
                file: path,
                missing_field: entry,
            },
            other => Self::Archive(other),
        }
    }
}

/// Why an extension could not be instantiated
#[derive(Debug, thiserror::Error)]
pub enum LoadFailure {
    #[error("entry symbol '{0}' was not found in any extension")]
    EntrySymbolMissing(String),

    #[error("no constructor is registered for entry symbol '{0}'")]
    NotInstantiable(String),

    #[error("constructor for '{symbol}' failed: {source}")]
    Constructor {
        symbol: String,
        #[source]
        source: HookError,
    },
}

/// Result type for ext-runtime operations
pub type Result<T> = std::result::Result<T, Error>;
