//! The extension contract and its runtime instance.
//!
//! Extension authors implement [`Extension`] and register a zero-argument
//! constructor for their entry symbol in a
//! [`FactoryCatalog`](crate::factory::FactoryCatalog). Every hook receives
//! the extension's [`ExtensionContext`], which exposes its metadata, home
//! directory, configuration values, sibling extensions and symbol lookup.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use ext_archive::{ExtensionMetadata, FromConfigValue};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::loader::ModuleLoader;
use crate::manager::Host;
use crate::symbol::Symbol;

/// Error type returned by hooks and constructors.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by hooks.
pub type HookResult = std::result::Result<(), HookError>;

/// Behaviour supplied by an extension.
///
/// All hooks default to doing nothing.
pub trait Extension: Send + 'static {
    fn on_load(&mut self, _ctx: &ExtensionContext) -> HookResult {
        Ok(())
    }

    fn on_enable(&mut self, _ctx: &ExtensionContext) -> HookResult {
        Ok(())
    }

    fn on_disable(&mut self, _ctx: &ExtensionContext) -> HookResult {
        Ok(())
    }

    /// Access to the concrete type, used by [`ExtensionHandle::with_extension`].
    fn as_any(&self) -> &dyn Any;
}

/// Lifecycle state of an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionState {
    Created,
    Loaded,
    Enabled,
    Disabled,
    Removed,
}

impl fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Loaded => write!(f, "loaded"),
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// Step of the extension lifecycle, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Discover,
    Load,
    Enable,
    Disable,
    Unload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discover => write!(f, "discover"),
            Self::Load => write!(f, "load"),
            Self::Enable => write!(f, "enable"),
            Self::Disable => write!(f, "disable"),
            Self::Unload => write!(f, "unload"),
        }
    }
}

/// Directory name for an extension's home: spaces become `-`.
pub fn home_dir_name(extension: &str) -> String {
    extension.replace(' ', "-")
}

/// Capabilities handed to extension code.
///
/// Holds only weak references to the manager and to its own loader; an
/// extension can look at its siblings but never keeps them alive.
pub struct ExtensionContext {
    metadata: Arc<ExtensionMetadata>,
    home_base: PathBuf,
    loader: Weak<ModuleLoader>,
    host: Weak<Host>,
}

impl ExtensionContext {
    pub(crate) fn new(
        metadata: Arc<ExtensionMetadata>,
        home_base: PathBuf,
        loader: Weak<ModuleLoader>,
        host: Weak<Host>,
    ) -> Self {
        Self {
            metadata,
            home_base,
            loader,
            host,
        }
    }

    pub fn metadata(&self) -> &ExtensionMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// The extension's private directory, created on first use.
    pub fn home_directory(&self) -> Result<PathBuf> {
        let dir = self.home_base.join(home_dir_name(self.name()));
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
            tracing::debug!(
                extension = self.name(),
                dir = %dir.display(),
                "Created home directory"
            );
        }
        Ok(dir)
    }

    /// Typed lookup in the metadata document.
    ///
    /// Returns `default` when the key is absent or holds a value of another
    /// type. A type mismatch is logged, never raised.
    pub fn config_value<T: FromConfigValue>(&self, key: &str, default: T) -> T {
        let Some(value) = self.metadata.value(key) else {
            return default;
        };
        match value.get::<T>() {
            Some(typed) => typed,
            None => {
                tracing::warn!(
                    extension = self.name(),
                    key,
                    expected = std::any::type_name::<T>(),
                    found = value.type_name(),
                    "Config value has unexpected type, using default"
                );
                default
            }
        }
    }

    /// Look up another registered extension by name.
    pub fn sibling(&self, name: &str) -> Option<ExtensionHandle> {
        let host = self.host.upgrade()?;
        host.registry.get(name).map(ExtensionHandle::new)
    }

    /// All registered extensions, in registration order.
    pub fn list_extensions(&self) -> Vec<ExtensionHandle> {
        self.host.upgrade().map_or_else(Vec::new, |host| {
            host.registry
                .snapshot()
                .into_iter()
                .map(ExtensionHandle::new)
                .collect()
        })
    }

    /// Resolve a symbol: own archive first, then other extensions.
    pub fn resolve_symbol(&self, name: &str) -> Option<Arc<Symbol>> {
        self.loader.upgrade()?.find_symbol(name)
    }
}

impl fmt::Debug for ExtensionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("extension", &self.metadata.name)
            .field("home_base", &self.home_base)
            .finish()
    }
}

/// The constructed extension plus its lifecycle state.
///
/// The extension mutex is held for the whole of a transition, so
/// transitions of one extension never interleave.
pub(crate) struct ExtensionInstance {
    extension: Mutex<Box<dyn Extension>>,
    state: Mutex<ExtensionState>,
    context: ExtensionContext,
}

impl ExtensionInstance {
    pub(crate) fn new(extension: Box<dyn Extension>, context: ExtensionContext) -> Self {
        Self {
            extension: Mutex::new(extension),
            state: Mutex::new(ExtensionState::Created),
            context,
        }
    }

    pub(crate) fn state(&self) -> ExtensionState {
        *self.state.lock()
    }

    /// Validate the transition for `phase`, run its hook and move to the
    /// next state. A failing hook leaves the state unchanged.
    pub(crate) fn transition(&self, phase: Phase) -> Result<ExtensionState> {
        let mut extension = self.extension.lock();
        let name = self.context.name();
        let current = self.state();

        let target = match (phase, current) {
            (Phase::Load, ExtensionState::Created) => ExtensionState::Loaded,
            (Phase::Enable, ExtensionState::Loaded | ExtensionState::Disabled) => {
                ExtensionState::Enabled
            }
            (Phase::Enable, ExtensionState::Created) => {
                return Err(Error::NotLoaded {
                    name: name.to_string(),
                });
            }
            (Phase::Disable, ExtensionState::Enabled) => ExtensionState::Disabled,
            _ => {
                return Err(Error::InvalidTransition {
                    name: name.to_string(),
                    state: current,
                    phase,
                });
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match phase {
            Phase::Load => extension.on_load(&self.context),
            Phase::Enable => extension.on_enable(&self.context),
            Phase::Disable => extension.on_disable(&self.context),
            Phase::Discover | Phase::Unload => Ok(()),
        }));
        let result = outcome.unwrap_or_else(|payload| Err(panic_message(payload).into()));

        result.map_err(|source| Error::Hook {
            name: name.to_string(),
            phase,
            source,
        })?;

        *self.state.lock() = target;
        Ok(target)
    }

    /// Mark the instance removed, waiting for any running hook to finish.
    pub(crate) fn mark_removed(&self) {
        let _extension = self.extension.lock();
        *self.state.lock() = ExtensionState::Removed;
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("hook panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("hook panicked: {message}")
    } else {
        "hook panicked".to_string()
    }
}

/// Lookup-only view of a registered extension.
///
/// A handle never keeps its extension alive: it holds the metadata and a
/// weak reference to the loader, so an extension may store handles to its
/// siblings, or to itself, without outliving `unload`. Once the extension
/// is gone the handle reports [`ExtensionState::Removed`] and every lookup
/// through it comes back empty.
#[derive(Clone)]
pub struct ExtensionHandle {
    metadata: Arc<ExtensionMetadata>,
    file: PathBuf,
    loader: Weak<ModuleLoader>,
}

impl ExtensionHandle {
    pub(crate) fn new(loader: Arc<ModuleLoader>) -> Self {
        Self {
            metadata: loader.shared_metadata(),
            file: loader.file().to_path_buf(),
            loader: Arc::downgrade(&loader),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn metadata(&self) -> &ExtensionMetadata {
        &self.metadata
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn state(&self) -> ExtensionState {
        self.loader
            .upgrade()
            .map_or(ExtensionState::Removed, |loader| loader.state())
    }

    /// Whether the extension this handle points at still exists.
    pub fn is_alive(&self) -> bool {
        self.loader.strong_count() > 0
    }

    /// Borrow the extension as its concrete type.
    ///
    /// Returns `None` if the type does not match, while the extension is
    /// running one of its hooks, or once it has been dropped.
    pub fn with_extension<T: Extension, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let loader = self.loader.upgrade()?;
        let instance = loader.instance()?;
        let extension = instance.extension.try_lock()?;
        extension.as_any().downcast_ref::<T>().map(f)
    }

    /// Resolve a symbol as this extension would see it.
    pub fn find_symbol(&self, name: &str) -> Option<Arc<Symbol>> {
        self.loader.upgrade()?.find_symbol(name)
    }

    /// Number of symbol entries read from this extension's archive.
    pub fn archive_reads(&self) -> usize {
        self.loader
            .upgrade()
            .map_or(0, |loader| loader.archive_reads())
    }
}

impl fmt::Debug for ExtensionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionHandle")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("state", &self.state())
            .finish()
    }
}
