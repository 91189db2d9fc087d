//! Shared test utilities for the extension runtime workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`archive`] - [`TestArchive`] builder writing real `.ext` zip files
//! - [`recorder`] - [`Recorder`] extensions that record their hook calls

pub mod archive;
pub mod recorder;

pub use archive::{ExtensionDir, TestArchive};
pub use recorder::{EventLog, Recorder, register_recorder};
