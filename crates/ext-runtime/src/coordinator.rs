//! Cross-extension symbol resolution.
//!
//! Resolution of a name is serialized through the [`LockTable`]: at most one
//! resolution per name runs at a time, so concurrent callers asking for the
//! same unresolved symbol trigger exactly one archive read and then share
//! the cached result.
//!
//! When several extensions could define the same name, the first one
//! registered wins. Loaders are asked in registration order and the search
//! stops at the first hit.

use std::sync::Arc;

use crate::loader::ModuleLoader;
use crate::locks::LockTable;
use crate::registry::Registry;
use crate::symbol::Symbol;

/// Resolves symbol names against all registered module loaders.
#[derive(Debug, Default)]
pub struct SymbolCoordinator {
    locks: LockTable,
}

impl SymbolCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name`, asking `requester` first and then every registered
    /// loader in registration order.
    ///
    /// The registry is snapshotted before iteration, so no registry lock is
    /// held while archives are read. A loader that is unloaded in the
    /// meantime has a closed archive and simply reports not-found.
    pub fn resolve(
        &self,
        name: &str,
        requester: Option<&ModuleLoader>,
        registry: &Registry,
    ) -> Option<Arc<Symbol>> {
        self.locks.with_lock(name, || {
            if let Some(requester) = requester
                && let Some(symbol) = requester.resolve_local(name)
            {
                return Some(symbol);
            }

            let found = registry
                .snapshot()
                .iter()
                .find_map(|loader| loader.resolve_local(name));

            match &found {
                Some(symbol) => tracing::trace!(
                    symbol = name,
                    origin = symbol.origin(),
                    "Resolved symbol across extensions"
                ),
                None => tracing::trace!(symbol = name, "Symbol not found in any extension"),
            }
            found
        })
    }

    /// Run `f` under the lock for `name`. Reentrant for the calling thread.
    pub(crate) fn with_name_lock<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        self.locks.with_lock(name, f)
    }

    /// Number of names currently being resolved.
    pub fn in_flight(&self) -> usize {
        self.locks.in_flight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::detached_loader;

    #[test]
    fn test_requester_is_asked_first() {
        let registry = Registry::new();
        let first = detached_loader("first", &[("shared/Name.sym", "from first")]);
        let second = detached_loader("second", &[("shared/Name.sym", "from second")]);
        registry.insert(Arc::clone(&first)).unwrap();
        registry.insert(Arc::clone(&second)).unwrap();

        let coordinator = SymbolCoordinator::new();
        let symbol = coordinator
            .resolve("shared.Name", Some(&*second), &registry)
            .unwrap();
        assert_eq!(symbol.origin(), "second");
        assert_eq!(first.archive_reads(), 0);
    }

    #[test]
    fn test_first_registered_wins_without_requester() {
        let registry = Registry::new();
        registry
            .insert(detached_loader("first", &[("shared/Name.sym", "1")]))
            .unwrap();
        registry
            .insert(detached_loader("second", &[("shared/Name.sym", "2")]))
            .unwrap();

        let coordinator = SymbolCoordinator::new();
        let symbol = coordinator.resolve("shared.Name", None, &registry).unwrap();
        assert_eq!(symbol.origin(), "first");
        assert_eq!(symbol.as_text(), Some("1"));
    }

    #[test]
    fn test_escalates_past_requester() {
        let registry = Registry::new();
        let asking = detached_loader("asking", &[]);
        registry.insert(Arc::clone(&asking)).unwrap();
        registry
            .insert(detached_loader("provider", &[("lib/Util.sym", "util")]))
            .unwrap();

        let coordinator = SymbolCoordinator::new();
        let symbol = coordinator.resolve("lib.Util", Some(&*asking), &registry).unwrap();
        assert_eq!(symbol.origin(), "provider");
        assert!(asking.cached_symbols().is_empty());
    }

    #[test]
    fn test_not_found_and_table_pruned() {
        let registry = Registry::new();
        registry.insert(detached_loader("only", &[])).unwrap();

        let coordinator = SymbolCoordinator::new();
        assert!(coordinator.resolve("no.Such", None, &registry).is_none());
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[test]
    fn test_closed_loader_is_skipped() {
        let registry = Registry::new();
        let closed = detached_loader("closed", &[("x/Y.sym", "closed")]);
        closed.close();
        registry.insert(closed).unwrap();
        registry
            .insert(detached_loader("open", &[("x/Y.sym", "open")]))
            .unwrap();

        let coordinator = SymbolCoordinator::new();
        let symbol = coordinator.resolve("x.Y", None, &registry).unwrap();
        assert_eq!(symbol.origin(), "open");
    }
}
