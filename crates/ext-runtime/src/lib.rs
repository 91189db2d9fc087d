//! Extension runtime: loading, cross-extension symbol resolution and
//! lifecycle management.
//!
//! Extensions ship as archives holding an `extension.yml` descriptor and
//! symbol entries. The host links extension code in through a
//! [`FactoryCatalog`] and lets an [`ExtensionManager`] discover, order and
//! drive them:
//!
//! ```no_run
//! use ext_runtime::{ExtensionManager, FactoryCatalog, LoaderConfig};
//!
//! # fn main() -> ext_runtime::Result<()> {
//! let manager = ExtensionManager::new(LoaderConfig::new("plugins"), FactoryCatalog::new());
//! let loaded = manager.load_all()?;
//! let enabled = manager.enable_all()?;
//! for failure in loaded.failures.iter().chain(&enabled.failures) {
//!     eprintln!("{} failed during {}: {}", failure.name, failure.phase, failure.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`loader`] - Per-extension archive access and symbol cache
//! - [`coordinator`] - Cross-extension resolution, serialized per name
//! - [`locks`] - Reference-counted per-name reentrant locks
//! - [`manager`] - Discovery, registry and lifecycle batches
//! - [`dependency`] - Dependency graph and load order
//! - [`extension`] - The extension contract and its context

pub mod config;
pub mod coordinator;
pub mod dependency;
pub mod error;
pub mod extension;
pub mod factory;
pub mod loader;
pub mod locks;
pub mod logging;
pub mod manager;
pub mod registry;
pub mod symbol;

pub use config::{DEFAULT_RESERVED_NAMESPACE, LoaderConfig};
pub use dependency::DependencyGraph;
pub use error::{Error, LoadFailure, Result};
pub use extension::{
    Extension, ExtensionContext, ExtensionHandle, ExtensionState, HookError, HookResult, Phase,
};
pub use factory::{ExtensionFactory, FactoryCatalog};
pub use loader::{ModuleLoader, SymbolError};
pub use manager::{BatchReport, DiscoveryReport, ExtensionManager, Rejection, UnitFailure};
pub use symbol::{NamespaceInfo, Symbol};
