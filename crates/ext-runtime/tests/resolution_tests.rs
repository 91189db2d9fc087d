//! Cross-extension symbol resolution, including concurrent access

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{add_recorder, manager};
use ext_runtime::{ExtensionManager, FactoryCatalog, LoaderConfig};
use ext_test_utils::{EventLog, ExtensionDir, TestArchive};
use pretty_assertions::assert_eq;
use rstest::rstest;

const THREADS: usize = 16;

/// Two extensions that both define `shared.Config`, plus one that defines
/// `lib.Util`.
fn two_providers(dir: &ExtensionDir) -> ExtensionManager {
    let log = EventLog::new();
    let mut catalog = FactoryCatalog::new();
    dir.add(
        TestArchive::new("first")
            .symbol("shared.Config", "first config")
            .symbol("shared.Big", &"x".repeat(64 * 1024)),
    );
    dir.add(
        TestArchive::new("second")
            .symbol("shared.Config", "second config")
            .symbol("lib.Util", "util"),
    );
    for name in ["first", "second"] {
        add_recorder(&mut catalog, &log, name, None);
    }
    let manager = manager(dir, catalog);
    manager.load_all().unwrap();
    manager
}

#[test]
fn test_concurrent_requests_read_archive_once() {
    let dir = ExtensionDir::new();
    let manager = Arc::new(two_providers(&dir));
    let provider = manager.get_extension_by_name("first").unwrap();
    let reads_before = provider.archive_reads();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.resolve_symbol("shared.Big").unwrap()
            })
        })
        .collect();
    let symbols: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(provider.archive_reads(), reads_before + 1);
    for symbol in &symbols[1..] {
        assert!(Arc::ptr_eq(&symbols[0], symbol));
    }
    assert_eq!(symbols[0].bytes().len(), 64 * 1024);
    assert_eq!(manager.in_flight_resolutions(), 0);
}

#[test]
fn test_concurrent_requests_from_different_extensions() {
    let dir = ExtensionDir::new();
    let manager = two_providers(&dir);
    let first = manager.get_extension_by_name("first").unwrap();
    let second = manager.get_extension_by_name("second").unwrap();
    let barrier = Barrier::new(THREADS);

    let symbols: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let asking = if i % 2 == 0 { &first } else { &second };
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    asking.find_symbol("lib.Util").unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for symbol in &symbols {
        assert!(Arc::ptr_eq(&symbols[0], symbol));
        assert_eq!(symbol.origin(), "second");
    }
    assert_eq!(second.archive_reads(), 2);
    assert_eq!(first.archive_reads(), 1);
}

#[test]
fn test_concurrent_not_found_is_consistent() {
    let dir = ExtensionDir::new();
    let manager = Arc::new(two_providers(&dir));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.resolve_symbol("no.such.Thing").is_none())
        })
        .collect();

    assert!(handles.into_iter().all(|h| h.join().unwrap()));
    assert_eq!(manager.in_flight_resolutions(), 0);
}

#[test]
fn test_first_registered_wins() {
    let dir = ExtensionDir::new();
    let manager = two_providers(&dir);

    let symbol = manager.resolve_symbol("shared.Config").unwrap();
    assert_eq!(symbol.origin(), "first");
    assert_eq!(symbol.as_text(), Some("first config"));
    assert_eq!(symbol.namespace(), Some("shared"));
}

#[test]
fn test_extension_sees_its_own_definition_first() {
    let dir = ExtensionDir::new();
    let manager = two_providers(&dir);
    let second = manager.get_extension_by_name("second").unwrap();

    let own = second.find_symbol("shared.Config").unwrap();
    assert_eq!(own.as_text(), Some("second config"));

    let global = manager.resolve_symbol("shared.Config").unwrap();
    assert_eq!(global.origin(), "first");
    assert!(!Arc::ptr_eq(&own, &global));
}

#[test]
fn test_repeated_lookup_hits_cache() {
    let dir = ExtensionDir::new();
    let manager = two_providers(&dir);
    let second = manager.get_extension_by_name("second").unwrap();

    let a = manager.resolve_symbol("lib.Util").unwrap();
    let b = manager.resolve_symbol("lib.Util").unwrap();
    let c = second.find_symbol("lib.Util").unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));
    assert_eq!(second.archive_reads(), 2);
}

#[test]
fn test_unloaded_extension_stops_serving_new_symbols() {
    let dir = ExtensionDir::new();
    let manager = two_providers(&dir);

    let kept = manager.resolve_symbol("lib.Util").unwrap();
    manager.unload("second").unwrap();

    assert!(manager.resolve_symbol("lib.Util").is_none());
    assert_eq!(kept.as_text(), Some("util"));
    // The other definition is still reachable
    assert_eq!(
        manager.resolve_symbol("shared.Config").unwrap().origin(),
        "first"
    );
}

#[rstest]
#[case("ext_runtime", "ext_runtime.Manager", true)]
#[case("ext_runtime", "ext_runtime.inner.Secret", true)]
#[case("ext_runtime", "ext_runtimes.Other", false)]
#[case("host.api", "host.api.Handle", true)]
fn test_reserved_namespace(#[case] reserved: &str, #[case] symbol: &str, #[case] hidden: bool) {
    let dir = ExtensionDir::new();
    let log = EventLog::new();
    let mut catalog = FactoryCatalog::new();
    dir.add(TestArchive::new("sneaky").symbol(symbol, "shadow"));
    add_recorder(&mut catalog, &log, "sneaky", None);
    let config: LoaderConfig = dir.config().with_reserved_namespace(reserved);
    let manager = ExtensionManager::new(config, catalog);
    manager.load_all().unwrap();

    assert_eq!(manager.resolve_symbol(symbol).is_none(), hidden);
    let sneaky = manager.get_extension_by_name("sneaky").unwrap();
    assert_eq!(sneaky.find_symbol(symbol).is_none(), hidden);
}

#[test]
fn test_resolve_while_unloading_never_tears() {
    let dir = ExtensionDir::new();
    let log = EventLog::new();
    let mut catalog = FactoryCatalog::new();
    let mut archive = TestArchive::new("bulk");
    for i in 0..64 {
        archive = archive.symbol(&format!("bulk.Item{i}"), &format!("item {i}"));
    }
    dir.add(archive);
    add_recorder(&mut catalog, &log, "bulk", None);
    let manager = manager(&dir, catalog);
    manager.load_all().unwrap();

    thread::scope(|scope| {
        let reader = scope.spawn(|| {
            (0..64)
                .filter_map(|i| manager.resolve_symbol(&format!("bulk.Item{i}")))
                .map(|symbol| {
                    let index = symbol.name().trim_start_matches("bulk.Item");
                    assert_eq!(symbol.as_text().unwrap(), format!("item {index}"));
                })
                .count()
        });
        manager.unload("bulk").unwrap();
        let served = reader.join().unwrap();
        assert!(served <= 64);
    });
    assert_eq!(manager.in_flight_resolutions(), 0);
}
