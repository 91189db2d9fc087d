//! Extension lifecycle management.
//!
//! The [`ExtensionManager`] owns the registry, the symbol coordinator and
//! the constructor catalog. It discovers archives, registers one module
//! loader per extension and drives the lifecycle:
//!
//! ```text
//! CREATED --load--> LOADED --enable--> ENABLED <--disable/enable--> DISABLED
//!    \                 \                  \                           /
//!     +-----------------+-----unload-------+-------------------------+--> REMOVED
//! ```
//!
//! Batch operations never stop at the first failing extension: every
//! failure is logged and collected in a [`BatchReport`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ext_archive::{ExtensionMetadata, ZipPackage};

use crate::config::LoaderConfig;
use crate::coordinator::SymbolCoordinator;
use crate::dependency::DependencyGraph;
use crate::error::{Error, Result};
use crate::extension::{ExtensionHandle, ExtensionState, Phase};
use crate::factory::FactoryCatalog;
use crate::loader::ModuleLoader;
use crate::registry::Registry;
use crate::symbol::Symbol;

/// Shared state reachable from loaders and contexts through weak references.
pub(crate) struct Host {
    pub(crate) config: LoaderConfig,
    pub(crate) registry: Registry,
    pub(crate) coordinator: SymbolCoordinator,
    pub(crate) factories: FactoryCatalog,
}

/// One extension that failed during a batch.
#[derive(Debug)]
pub struct UnitFailure {
    /// Extension name, or the archive path when the name is not known.
    pub name: String,
    pub phase: Phase,
    pub error: Error,
}

/// Outcome of a batch operation.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failures: Vec<UnitFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The failure recorded for `name`, if any.
    pub fn failure(&self, name: &str) -> Option<&UnitFailure> {
        self.failures
            .iter()
            .find(|failure| ext_archive::same_name(&failure.name, name))
    }

    fn record(&mut self, name: &str, phase: Phase, outcome: Result<ExtensionState>) {
        match outcome {
            Ok(_) => self.succeeded.push(name.to_string()),
            Err(error) => {
                tracing::error!(
                    extension = name,
                    phase = %phase,
                    error = %error,
                    "Extension failed"
                );
                self.failures.push(UnitFailure {
                    name: name.to_string(),
                    phase,
                    error,
                });
            }
        }
    }
}

/// An archive that discovery did not register.
#[derive(Debug)]
pub struct Rejection {
    pub file: PathBuf,
    pub error: Error,
}

/// Outcome of scanning the extensions directory.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Names registered by this scan, in file-name order.
    pub registered: Vec<String>,
    pub rejected: Vec<Rejection>,
}

/// Discovers, registers and drives extensions.
pub struct ExtensionManager {
    host: Arc<Host>,
}

impl ExtensionManager {
    pub fn new(config: LoaderConfig, factories: FactoryCatalog) -> Self {
        Self {
            host: Arc::new(Host {
                config,
                registry: Registry::new(),
                coordinator: SymbolCoordinator::new(),
                factories,
            }),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.host.config
    }

    /// Scan the extensions directory and register every archive that is not
    /// registered yet.
    ///
    /// Archives are visited in file-name order. An archive with incomplete
    /// metadata, a taken name or an entry symbol that cannot be instantiated
    /// is logged and skipped; the scan continues.
    pub fn discover(&self) -> Result<DiscoveryReport> {
        let config = &self.host.config;
        let files = ext_archive::scan_directory(&config.extensions_dir, &config.archive_suffix)?;
        let mut report = DiscoveryReport::default();

        for file in files {
            if self.host.registry.contains_file(&file) {
                continue;
            }
            match self.register_archive(&file) {
                Ok(handle) => report.registered.push(handle.name().to_string()),
                Err(error) => {
                    tracing::warn!(
                        file = %file.display(),
                        error = %error,
                        "Rejected extension archive"
                    );
                    report.rejected.push(Rejection { file, error });
                }
            }
        }

        tracing::info!(
            dir = %config.extensions_dir.display(),
            registered = report.registered.len(),
            rejected = report.rejected.len(),
            "Discovered extensions"
        );
        Ok(report)
    }

    /// Open one archive, read its metadata and register a loader for it.
    /// The extension is left in the CREATED state.
    pub fn register_archive(&self, path: &Path) -> Result<ExtensionHandle> {
        let config = &self.host.config;
        let mut archive = ZipPackage::open(path)?;
        let metadata = ExtensionMetadata::from_archive(&mut archive, &config.metadata_entry)
            .map_err(Error::from_metadata)?;

        if self.host.registry.contains(&metadata.name) {
            return Err(Error::DuplicateName {
                name: metadata.name,
            });
        }

        let loader = ModuleLoader::initialize(metadata, Box::new(archive), &self.host)?;
        if let Err(e) = self.host.registry.insert(Arc::clone(&loader)) {
            loader.close();
            return Err(e);
        }

        tracing::info!(
            extension = loader.name(),
            version = %loader.metadata().version,
            file = %path.display(),
            "Registered extension"
        );
        Ok(ExtensionHandle::new(loader))
    }

    /// Load one extension, given its name or the path of its archive.
    ///
    /// A path that is not registered yet is registered first. Relative
    /// paths are also tried against the extensions directory.
    pub fn load(&self, file_or_name: &str) -> Result<ExtensionHandle> {
        let loader = match self.host.registry.get(file_or_name) {
            Some(loader) => loader,
            None => self.loader_for_file(file_or_name)?,
        };
        loader_transition(&loader, Phase::Load)?;
        Ok(ExtensionHandle::new(loader))
    }

    fn loader_for_file(&self, file: &str) -> Result<Arc<ModuleLoader>> {
        let given = PathBuf::from(file);
        let candidates = [given.clone(), self.host.config.extensions_dir.join(&given)];
        let Some(path) = candidates.into_iter().find(|p| p.is_file()) else {
            return Err(Error::UnknownExtension(file.to_string()));
        };

        if let Some(loader) = self.host.registry.get_file(&path) {
            return Ok(loader);
        }
        let handle = self.register_archive(&path)?;
        self.loader(handle.name())
    }

    pub fn enable(&self, name: &str) -> Result<()> {
        let loader = self.loader(name)?;
        loader_transition(&loader, Phase::Enable).map(drop)
    }

    pub fn disable(&self, name: &str) -> Result<()> {
        let loader = self.loader(name)?;
        loader_transition(&loader, Phase::Disable).map(drop)
    }

    /// Unregister an extension and close its archive. No hook runs.
    ///
    /// Symbols already handed out stay valid; nothing new is read from the
    /// archive.
    pub fn unload(&self, name: &str) -> Result<()> {
        let loader = self
            .host
            .registry
            .remove(name)
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))?;
        loader.close();
        if let Some(instance) = loader.instance() {
            instance.mark_removed();
        }
        tracing::info!(extension = loader.name(), "Unloaded extension");
        Ok(())
    }

    /// Discover new archives, then load every CREATED extension in
    /// dependency order.
    ///
    /// The order is computed before any hook runs: a dependency cycle fails
    /// the whole batch and nothing is loaded.
    pub fn load_all(&self) -> Result<BatchReport> {
        let discovery = self.discover()?;
        let order = self.dependency_order()?;

        let mut report = BatchReport::default();
        for rejection in discovery.rejected {
            report.failures.push(UnitFailure {
                name: rejection.file.display().to_string(),
                phase: Phase::Discover,
                error: rejection.error,
            });
        }

        for loader in order {
            if loader.state() != ExtensionState::Created {
                continue;
            }
            report.record(loader.name(), Phase::Load, loader_transition(&loader, Phase::Load));
        }

        log_batch(Phase::Load, &report);
        Ok(report)
    }

    /// Enable every loaded or disabled extension in dependency order.
    ///
    /// An extension still CREATED is reported as not loaded.
    pub fn enable_all(&self) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for loader in self.dependency_order()? {
            match loader.state() {
                ExtensionState::Enabled | ExtensionState::Removed => continue,
                _ => report.record(
                    loader.name(),
                    Phase::Enable,
                    loader_transition(&loader, Phase::Enable),
                ),
            }
        }
        log_batch(Phase::Enable, &report);
        Ok(report)
    }

    /// Disable every enabled extension, dependents first.
    pub fn disable_all(&self) -> BatchReport {
        let mut report = BatchReport::default();
        for loader in self.reverse_order() {
            if loader.state() == ExtensionState::Enabled {
                report.record(
                    loader.name(),
                    Phase::Disable,
                    loader_transition(&loader, Phase::Disable),
                );
            }
        }
        log_batch(Phase::Disable, &report);
        report
    }

    /// Unload every extension, dependents first.
    pub fn unload_all(&self) -> BatchReport {
        let mut report = BatchReport::default();
        for loader in self.reverse_order() {
            let outcome = self.unload(loader.name()).map(|()| ExtensionState::Removed);
            report.record(loader.name(), Phase::Unload, outcome);
        }
        log_batch(Phase::Unload, &report);
        report
    }

    /// Registered extensions in registration order.
    pub fn list_extensions(&self) -> Vec<ExtensionHandle> {
        self.host
            .registry
            .snapshot()
            .into_iter()
            .map(ExtensionHandle::new)
            .collect()
    }

    pub fn get_extension_by_name(&self, name: &str) -> Option<ExtensionHandle> {
        self.host.registry.get(name).map(ExtensionHandle::new)
    }

    /// Resolve a symbol from any registered extension; the first registered
    /// extension that has it wins.
    pub fn resolve_symbol(&self, name: &str) -> Option<Arc<Symbol>> {
        self.host
            .coordinator
            .resolve(name, None, &self.host.registry)
    }

    /// Names of the registered extensions in the order `load_all` would
    /// process them.
    pub fn load_order(&self) -> Result<Vec<String>> {
        Ok(self
            .dependency_order()?
            .iter()
            .map(|loader| loader.name().to_string())
            .collect())
    }

    /// Number of symbol names whose resolution is currently in progress.
    pub fn in_flight_resolutions(&self) -> usize {
        self.host.coordinator.in_flight()
    }

    fn loader(&self, name: &str) -> Result<Arc<ModuleLoader>> {
        self.host
            .registry
            .get(name)
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))
    }

    fn dependency_order(&self) -> Result<Vec<Arc<ModuleLoader>>> {
        let loaders = self.host.registry.snapshot();
        let order = DependencyGraph::from_metadata(loaders.iter().map(|l| l.metadata()))
            .topological_order()?;
        Ok(order.into_iter().map(|i| Arc::clone(&loaders[i])).collect())
    }

    /// Reverse dependency order. Falls back to reverse registration order
    /// when the dependencies form a cycle, so teardown always proceeds.
    fn reverse_order(&self) -> Vec<Arc<ModuleLoader>> {
        let mut order = self.dependency_order().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Using registration order for teardown");
            self.host.registry.snapshot()
        });
        order.reverse();
        order
    }
}

impl std::fmt::Debug for ExtensionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionManager")
            .field("config", &self.host.config)
            .field("registry", &self.host.registry)
            .field("factories", &self.host.factories)
            .finish()
    }
}

fn loader_transition(loader: &ModuleLoader, phase: Phase) -> Result<ExtensionState> {
    let instance = loader.instance().ok_or_else(|| Error::NotLoaded {
        name: loader.name().to_string(),
    })?;
    let state = instance.transition(phase)?;
    tracing::debug!(extension = loader.name(), phase = %phase, state = %state, "Transitioned");
    Ok(state)
}

fn log_batch(phase: Phase, report: &BatchReport) {
    tracing::info!(
        phase = %phase,
        succeeded = report.succeeded.len(),
        failed = report.failures.len(),
        "Batch finished"
    );
}
