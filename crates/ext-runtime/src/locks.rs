//! Per-name reentrant locks with reference-counted entries.
//!
//! Every in-flight resolution of a symbol name holds a lease on that name's
//! entry. The entry is created by the first lease and dropped with the last,
//! so the table only ever holds names that are actively being resolved.
//! Structural changes (insert, count, prune) happen under one coarse mutex;
//! the per-name locks themselves are taken outside it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

struct LockEntry {
    lock: Arc<ReentrantMutex<()>>,
    waiters: usize,
}

/// Table of per-name reentrant locks.
#[derive(Default)]
pub struct LockTable {
    entries: Mutex<HashMap<String, LockEntry>>,
}

/// Releases a name's table entry when dropped.
struct Lease<'a> {
    table: &'a LockTable,
    name: &'a str,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.table.release(self.name);
    }
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `name`.
    ///
    /// The lock is reentrant: a thread that already holds `name` (directly or
    /// further up its call chain) passes straight through.
    pub fn with_lock<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        let lock = self.acquire(name);
        let _lease = Lease { table: self, name };
        let _guard = lock.lock();
        f()
    }

    /// Number of names with at least one in-flight lease.
    pub fn in_flight(&self) -> usize {
        self.entries.lock().len()
    }

    /// Number of leases currently held or waited on for `name`.
    pub fn waiters(&self, name: &str) -> usize {
        self.entries.lock().get(name).map_or(0, |entry| entry.waiters)
    }

    fn acquire(&self, name: &str) -> Arc<ReentrantMutex<()>> {
        let mut entries = self.entries.lock();
        let entry = entries.entry(name.to_string()).or_insert_with(|| LockEntry {
            lock: Arc::new(ReentrantMutex::new(())),
            waiters: 0,
        });
        entry.waiters += 1;
        Arc::clone(&entry.lock)
    }

    fn release(&self, name: &str) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(name) {
            entry.waiters -= 1;
            if entry.waiters == 0 {
                entries.remove(name);
            }
        }
    }
}

impl std::fmt::Debug for LockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockTable")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
