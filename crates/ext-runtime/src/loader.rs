//! Per-extension module loader.
//!
//! A [`ModuleLoader`] owns one extension's archive and a grow-only cache of
//! the symbols it has materialized from it. It lazily reads symbol entries
//! on demand and cooperates with the [`SymbolCoordinator`] to reach symbols
//! defined by other extensions.
//!
//! [`SymbolCoordinator`]: crate::coordinator::SymbolCoordinator

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use ext_archive::{Archive, ExtensionMetadata};
use parking_lot::{Mutex, RwLock};

use crate::error::{Error, LoadFailure, Result};
use crate::extension::{ExtensionContext, ExtensionInstance, ExtensionState};
use crate::manager::Host;
use crate::symbol::{self, NamespaceInfo, Symbol};

/// Errors raised while materializing a symbol.
#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("symbol '{name}' is already defined by extension '{extension}'")]
    Redefined { name: String, extension: String },

    #[error("namespace '{namespace}' is already defined with different attributes")]
    NamespaceConflict { namespace: String },

    #[error(transparent)]
    Archive(#[from] ext_archive::Error),
}

/// Loads symbols for a single extension.
pub struct ModuleLoader {
    metadata: Arc<ExtensionMetadata>,
    file: PathBuf,
    reserved_namespace: String,
    archive: Mutex<Option<Box<dyn Archive>>>,
    symbols: RwLock<HashMap<String, Arc<Symbol>>>,
    namespaces: Mutex<HashMap<String, NamespaceInfo>>,
    reads: AtomicUsize,
    host: Weak<Host>,
    this: Weak<ModuleLoader>,
    instance: OnceLock<ExtensionInstance>,
}

impl ModuleLoader {
    /// Build a loader without resolving anything yet.
    pub(crate) fn new(
        metadata: ExtensionMetadata,
        archive: Box<dyn Archive>,
        reserved_namespace: &str,
        host: Weak<Host>,
    ) -> Arc<Self> {
        let file = archive.path().to_path_buf();
        Arc::new_cyclic(|this| Self {
            metadata: Arc::new(metadata),
            file,
            reserved_namespace: reserved_namespace.to_string(),
            archive: Mutex::new(Some(archive)),
            symbols: RwLock::new(HashMap::new()),
            namespaces: Mutex::new(HashMap::new()),
            reads: AtomicUsize::new(0),
            host,
            this: this.clone(),
            instance: OnceLock::new(),
        })
    }

    /// Open an extension: resolve its entry symbol, construct the extension
    /// through the registered factory and attach the instance.
    ///
    /// On any failure the archive is closed before the error is returned, so
    /// nothing of the half-built loader stays alive.
    pub(crate) fn initialize(
        metadata: ExtensionMetadata,
        archive: Box<dyn Archive>,
        host: &Arc<Host>,
    ) -> Result<Arc<Self>> {
        let loader = Self::new(
            metadata,
            archive,
            &host.config.reserved_namespace,
            Arc::downgrade(host),
        );

        match loader.instantiate(host) {
            Ok(instance) => {
                // Only this function sets the instance, and it runs once per loader
                let _ = loader.instance.set(instance);
                tracing::debug!(
                    extension = loader.name(),
                    entry = %loader.metadata.main,
                    "Extension instantiated"
                );
                Ok(loader)
            }
            Err(cause) => {
                loader.close();
                Err(Error::Load {
                    file: loader.file.clone(),
                    cause,
                })
            }
        }
    }

    fn instantiate(&self, host: &Arc<Host>) -> std::result::Result<ExtensionInstance, LoadFailure> {
        let entry = &self.metadata.main;

        let symbol = host
            .coordinator
            .resolve(entry, Some(self), &host.registry)
            .ok_or_else(|| LoadFailure::EntrySymbolMissing(entry.clone()))?;

        if symbol.origin() != self.name() {
            tracing::debug!(
                extension = self.name(),
                entry = %entry,
                origin = symbol.origin(),
                "Entry symbol provided by another extension"
            );
        }

        let factory = host
            .factories
            .get(entry)
            .ok_or_else(|| LoadFailure::NotInstantiable(entry.clone()))?;

        let extension = factory().map_err(|source| LoadFailure::Constructor {
            symbol: entry.clone(),
            source,
        })?;

        let context = ExtensionContext::new(
            Arc::clone(&self.metadata),
            host.config.home_base().to_path_buf(),
            self.this.clone(),
            Arc::downgrade(host),
        );
        Ok(ExtensionInstance::new(extension, context))
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &ExtensionMetadata {
        &self.metadata
    }

    pub(crate) fn shared_metadata(&self) -> Arc<ExtensionMetadata> {
        Arc::clone(&self.metadata)
    }

    /// Archive the extension was loaded from.
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub(crate) fn instance(&self) -> Option<&ExtensionInstance> {
        self.instance.get()
    }

    pub fn state(&self) -> ExtensionState {
        self.instance().map_or(ExtensionState::Created, ExtensionInstance::state)
    }

    /// Number of symbol entries read from the archive so far.
    pub fn archive_reads(&self) -> usize {
        self.reads.load(Ordering::Acquire)
    }

    /// Names currently in the symbol cache, sorted.
    pub fn cached_symbols(&self) -> Vec<String> {
        let mut names: Vec<String> = self.symbols.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_closed(&self) -> bool {
        self.archive.lock().is_none()
    }

    /// Find a symbol visible to this extension: its own cache and archive
    /// first, then every other registered extension.
    pub fn find_symbol(&self, name: &str) -> Option<Arc<Symbol>> {
        if symbol::in_namespace(name, &self.reserved_namespace) {
            return None;
        }
        if let Some(symbol) = self.symbols.read().get(name) {
            return Some(Arc::clone(symbol));
        }
        match self.host.upgrade() {
            Some(host) => host.coordinator.resolve(name, Some(self), &host.registry),
            None => self.resolve_local(name),
        }
    }

    /// Resolve `name` from this extension only. Never escalates.
    ///
    /// Errors while reading are logged and reported as not-found; nothing is
    /// cached for a failed read.
    pub fn resolve_local(&self, name: &str) -> Option<Arc<Symbol>> {
        match self.try_resolve_local(name) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    extension = self.name(),
                    symbol = name,
                    error = %e,
                    "Failed to materialize symbol"
                );
                None
            }
        }
    }

    /// Fallible form of [`resolve_local`](Self::resolve_local).
    pub fn try_resolve_local(
        &self,
        name: &str,
    ) -> std::result::Result<Option<Arc<Symbol>>, SymbolError> {
        if symbol::in_namespace(name, &self.reserved_namespace) {
            return Ok(None);
        }
        if let Some(symbol) = self.symbols.read().get(name) {
            return Ok(Some(Arc::clone(symbol)));
        }

        // Reentrant: a coordinator resolving this name on this thread already
        // holds the lock.
        match self.host.upgrade() {
            Some(host) => host
                .coordinator
                .with_name_lock(name, || self.materialize(name)),
            None => self.materialize(name),
        }
    }

    fn materialize(&self, name: &str) -> std::result::Result<Option<Arc<Symbol>>, SymbolError> {
        if let Some(symbol) = self.symbols.read().get(name) {
            return Ok(Some(Arc::clone(symbol)));
        }

        let path = symbol::entry_path(name);
        let bytes = {
            let mut archive = self.archive.lock();
            let Some(archive) = archive.as_mut() else {
                tracing::debug!(
                    extension = self.name(),
                    symbol = name,
                    "Archive closed, symbol not available"
                );
                return Ok(None);
            };
            match archive.read_entry(&path)? {
                Some(bytes) => bytes,
                None => return Ok(None),
            }
        };
        self.reads.fetch_add(1, Ordering::AcqRel);

        if let Some(namespace) = symbol::namespace_of(name) {
            self.define_namespace(namespace, self.namespace_info())?;
        }
        self.define(name, bytes).map(Some)
    }

    fn namespace_info(&self) -> NamespaceInfo {
        NamespaceInfo {
            extension: self.metadata.name.clone(),
            version: self.metadata.version.clone(),
            source: self.file.clone(),
        }
    }

    /// Associate a namespace with this loader. Repeating an identical
    /// definition is a no-op.
    pub(crate) fn define_namespace(
        &self,
        namespace: &str,
        info: NamespaceInfo,
    ) -> std::result::Result<(), SymbolError> {
        let mut namespaces = self.namespaces.lock();
        match namespaces.get(namespace) {
            Some(existing) if *existing == info => Ok(()),
            Some(_) => Err(SymbolError::NamespaceConflict {
                namespace: namespace.to_string(),
            }),
            None => {
                namespaces.insert(namespace.to_string(), info);
                Ok(())
            }
        }
    }

    /// Add a symbol to the cache. Cached symbols are never replaced.
    pub(crate) fn define(
        &self,
        name: &str,
        bytes: Vec<u8>,
    ) -> std::result::Result<Arc<Symbol>, SymbolError> {
        match self.symbols.write().entry(name.to_string()) {
            Entry::Occupied(_) => Err(SymbolError::Redefined {
                name: name.to_string(),
                extension: self.metadata.name.clone(),
            }),
            Entry::Vacant(slot) => {
                let symbol = Arc::new(Symbol::new(name, &self.metadata.name, bytes));
                slot.insert(Arc::clone(&symbol));
                Ok(symbol)
            }
        }
    }

    /// Release the archive. Safe to call repeatedly and while another thread
    /// is reading: the read finishes first, later reads report not-found.
    pub fn close(&self) {
        if self.archive.lock().take().is_some() {
            tracing::debug!(extension = self.name(), file = %self.file.display(), "Archive closed");
        }
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("extension", &self.metadata.name)
            .field("file", &self.file)
            .field("state", &self.state())
            .field("cached", &self.symbols.read().len())
            .finish()
    }
}
