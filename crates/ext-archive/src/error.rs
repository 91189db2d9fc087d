//! Error types for ext-archive

use std::path::PathBuf;

/// Result type for ext-archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading extension packages
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive {path} does not contain {entry}")]
    MissingMetadata { path: PathBuf, entry: String },

    #[error("failed to parse metadata in {path}: {message}")]
    MalformedMetadata { path: PathBuf, message: String },

    /// A required metadata field is absent, empty, or not a scalar.
    #[error("metadata in {path} is missing required field '{field}'")]
    MissingField { path: PathBuf, field: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            path: path.into(),
            source,
        }
    }
}
