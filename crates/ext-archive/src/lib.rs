//! Archive container, metadata and directory scanning for extension packages.
//!
//! An extension package is a zip archive holding an [`METADATA_ENTRY`]
//! document plus any number of symbol entries. This crate only knows how to
//! open such archives, read entries by name and turn the metadata document
//! into an [`ExtensionMetadata`]; loading and lifecycle live in `ext-runtime`.

pub mod archive;
pub mod error;
pub mod metadata;
pub mod scan;
pub mod value;

/// The canonical name of the metadata entry inside every package.
pub const METADATA_ENTRY: &str = "extension.yml";

/// File suffix used to recognise package archives in a directory.
pub const ARCHIVE_SUFFIX: &str = ".ext";

pub use archive::{Archive, ZipPackage};
pub use error::{Error, Result};
pub use metadata::{ExtensionMetadata, name_key, same_name};
pub use scan::{archive_checksum, scan_directory};
pub use value::{ConfigValue, FromConfigValue};
