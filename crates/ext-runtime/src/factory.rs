//! Constructors for entry symbols.
//!
//! Archives carry symbol bytes, not executable code. The host links the code
//! in and tells the runtime which constructor belongs to which entry symbol:
//!
//! ```
//! use std::any::Any;
//! use ext_runtime::{Extension, FactoryCatalog};
//!
//! struct Audit;
//!
//! impl Extension for Audit {
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! let mut catalog = FactoryCatalog::new();
//! catalog.register("acme.audit.Audit", || Audit);
//! assert!(catalog.contains("acme.audit.Audit"));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::extension::{Extension, HookError};

/// Zero-argument constructor for an extension.
pub type ExtensionFactory =
    Arc<dyn Fn() -> std::result::Result<Box<dyn Extension>, HookError> + Send + Sync>;

/// Maps entry-symbol names to constructors.
#[derive(Clone, Default)]
pub struct FactoryCatalog {
    factories: BTreeMap<String, ExtensionFactory>,
}

impl FactoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an infallible constructor. A later registration for the
    /// same symbol replaces the earlier one.
    pub fn register<E, F>(&mut self, symbol: impl Into<String>, constructor: F) -> &mut Self
    where
        E: Extension,
        F: Fn() -> E + Send + Sync + 'static,
    {
        self.register_fallible(symbol, move || Ok(constructor()))
    }

    /// Register a constructor that may refuse to build the extension.
    pub fn register_fallible<E, F>(
        &mut self,
        symbol: impl Into<String>,
        constructor: F,
    ) -> &mut Self
    where
        E: Extension,
        F: Fn() -> std::result::Result<E, HookError> + Send + Sync + 'static,
    {
        let factory: ExtensionFactory =
            Arc::new(move || constructor().map(|ext| Box::new(ext) as Box<dyn Extension>));
        let symbol = symbol.into();
        if self.factories.insert(symbol.clone(), factory).is_some() {
            tracing::debug!(symbol = %symbol, "Replaced extension constructor");
        }
        self
    }

    pub fn get(&self, symbol: &str) -> Option<ExtensionFactory> {
        self.factories.get(symbol).cloned()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.factories.contains_key(symbol)
    }

    /// Registered symbol names, sorted.
    pub fn symbols(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for FactoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryCatalog")
            .field("symbols", &self.symbols())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    struct Named(&'static str);

    impl Extension for Named {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_register_and_construct() {
        let mut catalog = FactoryCatalog::new();
        catalog.register("b.B", || Named("b")).register("a.A", || Named("a"));

        assert_eq!(catalog.symbols(), vec!["a.A", "b.B"]);
        let factory = catalog.get("a.A").unwrap();
        let built = factory().unwrap();
        assert_eq!(built.as_any().downcast_ref::<Named>().unwrap().0, "a");
    }

    #[test]
    fn test_fallible_constructor_reports_error() {
        let mut catalog = FactoryCatalog::new();
        catalog.register_fallible::<Named, _>("a.A", || Err("no licence".into()));

        let err = catalog.get("a.A").unwrap()().err().unwrap();
        assert_eq!(err.to_string(), "no licence");
    }

    #[test]
    fn test_unknown_symbol() {
        let catalog = FactoryCatalog::new();
        assert!(catalog.get("missing.Main").is_none());
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_later_registration_replaces() {
        let mut catalog = FactoryCatalog::new();
        catalog.register("a.A", || Named("first"));
        catalog.register("a.A", || Named("second"));

        assert_eq!(catalog.len(), 1);
        let built = catalog.get("a.A").unwrap()().unwrap();
        assert_eq!(built.as_any().downcast_ref::<Named>().unwrap().0, "second");
    }
}
