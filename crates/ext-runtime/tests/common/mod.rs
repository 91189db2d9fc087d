#![allow(dead_code)]

use ext_runtime::{ExtensionManager, FactoryCatalog, Phase};
use ext_test_utils::{EventLog, ExtensionDir, TestArchive, register_recorder};

/// Write one plain archive per name and register a recorder for each entry
/// symbol.
pub fn recorder_setup(dir: &ExtensionDir, log: &EventLog, names: &[&str]) -> FactoryCatalog {
    let mut catalog = FactoryCatalog::new();
    for name in names {
        dir.add(TestArchive::new(name));
        register_recorder(&mut catalog, &TestArchive::default_main(name), name, log, None);
    }
    catalog
}

/// Register a recorder for an archive written by the caller.
pub fn add_recorder(
    catalog: &mut FactoryCatalog,
    log: &EventLog,
    name: &str,
    fail_on: Option<Phase>,
) {
    register_recorder(catalog, &TestArchive::default_main(name), name, log, fail_on);
}

pub fn manager(dir: &ExtensionDir, catalog: FactoryCatalog) -> ExtensionManager {
    ExtensionManager::new(dir.config(), catalog)
}

pub fn names(manager: &ExtensionManager) -> Vec<String> {
    manager
        .list_extensions()
        .iter()
        .map(|handle| handle.name().to_string())
        .collect()
}
