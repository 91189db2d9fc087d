//! Registry of loaded extensions.
//!
//! Names are unique case-insensitively, matching how dependency names are
//! compared. Registration order is preserved: it is the tie-break order for
//! symbol resolution and for dependency-free extensions in a load batch.

use std::path::Path;
use std::sync::Arc;

use ext_archive::same_name;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::loader::ModuleLoader;

/// Ordered, name-unique collection of module loaders.
#[derive(Default)]
pub struct Registry {
    loaders: RwLock<Vec<Arc<ModuleLoader>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loader. Rejects a name that is already taken and leaves
    /// the existing registration untouched.
    pub fn insert(&self, loader: Arc<ModuleLoader>) -> Result<()> {
        let mut loaders = self.loaders.write();
        if loaders
            .iter()
            .any(|existing| same_name(existing.name(), loader.name()))
        {
            return Err(Error::DuplicateName {
                name: loader.name().to_string(),
            });
        }
        loaders.push(loader);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModuleLoader>> {
        self.loaders
            .read()
            .iter()
            .find(|loader| same_name(loader.name(), name))
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether a loader was created from the archive at `path`.
    pub fn contains_file(&self, path: &Path) -> bool {
        self.get_file(path).is_some()
    }

    /// Loader created from the archive at `path`.
    pub fn get_file(&self, path: &Path) -> Option<Arc<ModuleLoader>> {
        self.loaders
            .read()
            .iter()
            .find(|loader| loader.file() == path)
            .cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ModuleLoader>> {
        let mut loaders = self.loaders.write();
        let index = loaders
            .iter()
            .position(|loader| same_name(loader.name(), name))?;
        Some(loaders.remove(index))
    }

    /// Loaders in registration order, copied out of the lock.
    pub fn snapshot(&self) -> Vec<Arc<ModuleLoader>> {
        self.loaders.read().clone()
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.loaders
            .read()
            .iter()
            .map(|loader| loader.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.loaders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.read().is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("extensions", &self.names())
            .finish()
    }
}
