//! Discovery, registration and rejection of extension archives

mod common;

use std::sync::Arc;

use common::{add_recorder, manager, names, recorder_setup};
use ext_runtime::{
    Error, ExtensionManager, ExtensionState, FactoryCatalog, LoadFailure, LoaderConfig,
};
use ext_test_utils::{EventLog, ExtensionDir, TestArchive};
use pretty_assertions::assert_eq;

#[test]
fn test_discover_registers_in_file_name_order() {
    let dir = ExtensionDir::new();
    let log = EventLog::new();
    let manager = manager(&dir, recorder_setup(&dir, &log, &["zeta", "alpha", "mid"]));
    dir.add_file("notes.txt", b"not an extension");

    let report = manager.discover().unwrap();

    assert_eq!(report.registered, vec!["alpha", "mid", "zeta"]);
    assert!(report.rejected.is_empty());
    assert_eq!(names(&manager), vec!["alpha", "mid", "zeta"]);
    for handle in manager.list_extensions() {
        assert_eq!(handle.state(), ExtensionState::Created);
        assert_eq!(handle.version(), "1.0");
    }
    assert!(log.events().is_empty());
}

#[test]
fn test_suffix_matches_case_insensitively() {
    let dir = ExtensionDir::new();
    let log = EventLog::new();
    let mut catalog = FactoryCatalog::new();
    dir.add(TestArchive::new("shouty").file_name("SHOUTY.EXT"));
    add_recorder(&mut catalog, &log, "shouty", None);
    let manager = manager(&dir, catalog);

    assert_eq!(manager.discover().unwrap().registered, vec!["shouty"]);
}

#[test]
fn test_rediscovery_skips_registered_archives() {
    let dir = ExtensionDir::new();
    let log = EventLog::new();
    let manager = manager(&dir, recorder_setup(&dir, &log, &["audit"]));

    manager.discover().unwrap();
    let again = manager.discover().unwrap();

    assert!(again.registered.is_empty());
    assert!(again.rejected.is_empty());
    assert_eq!(manager.list_extensions().len(), 1);
}

#[test]
fn test_missing_directory_is_empty() {
    let dir = ExtensionDir::new();
    let config = LoaderConfig::new(dir.root().join("does-not-exist"));
    let manager = ExtensionManager::new(config, FactoryCatalog::new());

    let report = manager.discover().unwrap();
    assert!(report.registered.is_empty());
    assert!(manager.load_all().unwrap().is_success());
}

#[test]
fn test_version_metadata_is_stringified() {
    let dir = ExtensionDir::new();
    let log = EventLog::new();
    let mut catalog = FactoryCatalog::new();
    dir.add(TestArchive::new("numeric").raw_metadata(
        "main: numeric.Main\nname: numeric\nversion: 1.0\ndepends: storage\n",
    ));
    add_recorder(&mut catalog, &log, "numeric", None);
    let manager = manager(&dir, catalog);
    manager.discover().unwrap();

    let handle = manager.get_extension_by_name("NUMERIC").unwrap();
    assert_eq!(handle.version(), "1.0");
    assert_eq!(handle.metadata().depends, vec!["storage"]);
}

mod rejections {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rejected_error(manager: &ExtensionManager, file: &str) -> Error {
        let report = manager.discover().unwrap();
        report
            .rejected
            .into_iter()
            .find(|r| r.file.file_name().is_some_and(|n| n == file))
            .map(|r| r.error)
            .unwrap_or_else(|| panic!("{file} was not rejected"))
    }

    #[test]
    fn test_missing_required_field() {
        let dir = ExtensionDir::new();
        let log = EventLog::new();
        let mut catalog = recorder_setup(&dir, &log, &["healthy"]);
        dir.add(TestArchive::new("noversion").without_version());
        add_recorder(&mut catalog, &log, "noversion", None);
        let manager = manager(&dir, catalog);

        let err = rejected_error(&manager, "noversion.ext");
        assert!(matches!(
            err,
            Error::Configuration { ref missing_field, .. } if missing_field == "version"
        ));
        assert_eq!(names(&manager), vec!["healthy"]);
    }

    #[test]
    fn test_missing_metadata_entry() {
        let dir = ExtensionDir::new();
        let manager = manager(&dir, FactoryCatalog::new());
        dir.add(TestArchive::new("bare").without_metadata());

        let err = rejected_error(&manager, "bare.ext");
        assert!(matches!(
            err,
            Error::Configuration { ref missing_field, .. } if missing_field == "extension.yml"
        ));
    }

    #[test]
    fn test_not_a_zip() {
        let dir = ExtensionDir::new();
        let manager = manager(&dir, FactoryCatalog::new());
        dir.add_file("corrupt.ext", b"PK but not really");

        let err = rejected_error(&manager, "corrupt.ext");
        assert!(matches!(err, Error::Archive(_)));
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let dir = ExtensionDir::new();
        let log = EventLog::new();
        let mut catalog = FactoryCatalog::new();
        dir.add(TestArchive::new("audit").file_name("a_audit.ext").version("1.0"));
        dir.add(TestArchive::new("Audit").file_name("b_audit.ext").version("2.0"));
        add_recorder(&mut catalog, &log, "audit", None);
        let manager = manager(&dir, catalog);

        let err = rejected_error(&manager, "b_audit.ext");
        assert!(matches!(err, Error::DuplicateName { ref name } if name == "Audit"));

        let kept = manager.get_extension_by_name("audit").unwrap();
        assert_eq!(kept.version(), "1.0");
        assert!(kept.file().ends_with("a_audit.ext"));
        assert_eq!(manager.list_extensions().len(), 1);
    }

    #[test]
    fn test_entry_symbol_missing() {
        let dir = ExtensionDir::new();
        let log = EventLog::new();
        let mut catalog = FactoryCatalog::new();
        dir.add(TestArchive::new("hollow").without_entry_symbol());
        add_recorder(&mut catalog, &log, "hollow", None);
        let manager = manager(&dir, catalog);

        let err = rejected_error(&manager, "hollow.ext");
        assert!(matches!(
            err,
            Error::Load {
                cause: LoadFailure::EntrySymbolMissing(_),
                ..
            }
        ));
        assert!(manager.list_extensions().is_empty());
    }

    #[test]
    fn test_no_constructor_registered() {
        let dir = ExtensionDir::new();
        let manager = manager(&dir, FactoryCatalog::new());
        dir.add(TestArchive::new("orphan"));

        let err = rejected_error(&manager, "orphan.ext");
        assert!(matches!(
            err,
            Error::Load {
                cause: LoadFailure::NotInstantiable(ref symbol),
                ..
            } if symbol == "orphan.Main"
        ));
    }

    #[test]
    fn test_failing_constructor() {
        let dir = ExtensionDir::new();
        let mut catalog = FactoryCatalog::new();
        catalog.register_fallible::<ext_test_utils::Recorder, _>("picky.Main", || {
            Err("licence check failed".into())
        });
        dir.add(TestArchive::new("picky"));
        let manager = manager(&dir, catalog);

        let err = rejected_error(&manager, "picky.ext");
        assert!(matches!(
            err,
            Error::Load {
                cause: LoadFailure::Constructor { .. },
                ..
            }
        ));
        assert!(err.to_string().contains("picky.ext"));
    }
}

#[test]
fn test_entry_symbol_from_another_extension() {
    let dir = ExtensionDir::new();
    let log = EventLog::new();
    let mut catalog = FactoryCatalog::new();
    dir.add(TestArchive::new("a_provider").symbol("shared.Plugin", "shared implementation"));
    dir.add(
        TestArchive::new("b_client")
            .main("shared.Plugin")
            .without_entry_symbol(),
    );
    add_recorder(&mut catalog, &log, "a_provider", None);
    ext_test_utils::register_recorder(&mut catalog, "shared.Plugin", "b_client", &log, None);
    let manager = manager(&dir, catalog);

    let report = manager.discover().unwrap();
    assert_eq!(report.registered, vec!["a_provider", "b_client"]);

    let provider = manager.get_extension_by_name("a_provider").unwrap();
    let client = manager.get_extension_by_name("b_client").unwrap();
    let via_client = client.find_symbol("shared.Plugin").unwrap();
    let via_manager = manager.resolve_symbol("shared.Plugin").unwrap();
    assert!(Arc::ptr_eq(&via_client, &via_manager));
    assert_eq!(via_client.origin(), "a_provider");
    assert_eq!(client.archive_reads(), 0);
    assert_eq!(provider.archive_reads(), 2);
}

#[test]
fn test_register_archive_directly() {
    let dir = ExtensionDir::new();
    let log = EventLog::new();
    let outside = tempfile::TempDir::new().unwrap();
    let path = TestArchive::new("loose").write_to(outside.path());
    let mut catalog = FactoryCatalog::new();
    add_recorder(&mut catalog, &log, "loose", None);
    let manager = manager(&dir, catalog);

    let handle = manager.register_archive(&path).unwrap();
    assert_eq!(handle.file(), path.as_path());
    assert!(matches!(
        manager.register_archive(&path),
        Err(Error::DuplicateName { .. })
    ));
    assert_eq!(manager.load_order().unwrap(), vec!["loose"]);
}
