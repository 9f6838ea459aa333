//! Session Table Tests
//!
//! Tests for descriptor allocation, memoization, and failure handling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tetherkv::session::{SessionTable, ROOT_ID};
use tetherkv::store::{Keyspace, MemStore, Store};
use tetherkv::TetherError;

/// Store wrapper that counts creation calls and refuses names starting
/// with "bad".
struct CountingStore {
    inner: Arc<MemStore>,
    keyspace_calls: AtomicUsize,
    substore_calls: AtomicUsize,
}

impl CountingStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemStore::new(),
            keyspace_calls: AtomicUsize::new(0),
            substore_calls: AtomicUsize::new(0),
        })
    }
}

impl Store for CountingStore {
    fn keyspace(&self, name: &str) -> tetherkv::Result<Keyspace> {
        self.keyspace_calls.fetch_add(1, Ordering::SeqCst);
        if name.starts_with("bad") {
            return Err(TetherError::Storage(format!("refusing keyspace {name:?}")));
        }
        self.inner.keyspace(name)
    }

    fn substore(&self, name: &str) -> tetherkv::Result<Arc<dyn Store>> {
        self.substore_calls.fetch_add(1, Ordering::SeqCst);
        if name.starts_with("bad") {
            return Err(TetherError::Storage(format!("refusing substore {name:?}")));
        }
        self.inner.substore(name)
    }
}

#[test]
fn test_resolve_keyspace_memoizes() {
    let store = CountingStore::new();
    let table = SessionTable::new(store.clone());

    let first = table.resolve_keyspace(ROOT_ID, "data").unwrap();
    let second = table.resolve_keyspace(ROOT_ID, "data").unwrap();
    assert_eq!(first, second);
    assert_eq!(store.keyspace_calls.load(Ordering::SeqCst), 1);

    // A different name gets a different descriptor and its own creation.
    let other = table.resolve_keyspace(ROOT_ID, "blobs").unwrap();
    assert_ne!(other, first);
    assert_eq!(store.keyspace_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_descriptors_are_shared_and_sequential() {
    let table = SessionTable::new(MemStore::new());

    // Keyspaces and substores draw from one counter; 0 is the root.
    let a = table.resolve_keyspace(ROOT_ID, "a").unwrap();
    let b = table.resolve_substore(ROOT_ID, "b").unwrap();
    let c = table.resolve_keyspace(b, "c").unwrap();
    assert_eq!((a, b, c), (1, 2, 3));
}

#[test]
fn test_failed_resolution_allocates_no_descriptor() {
    let store = CountingStore::new();
    let table = SessionTable::new(store.clone());

    let err = table.resolve_keyspace(ROOT_ID, "bad-keyspace").unwrap_err();
    assert!(err.to_string().contains("bad-keyspace"));
    let err = table.resolve_substore(ROOT_ID, "bad-sub").unwrap_err();
    assert!(err.to_string().contains("bad-sub"));

    // The counter did not advance and the name was not memoized.
    assert_eq!(table.resolve_keyspace(ROOT_ID, "good").unwrap(), 1);
    let err = table.resolve_keyspace(ROOT_ID, "bad-keyspace").unwrap_err();
    assert!(err.to_string().contains("refusing"));
}

#[test]
fn test_resolve_unknown_parent() {
    let table = SessionTable::new(MemStore::new());
    let err = table.resolve_keyspace(42, "data").unwrap_err();
    assert!(matches!(err, TetherError::InvalidStore(42)));

    // A keyspace descriptor is not a store descriptor.
    let ks = table.resolve_keyspace(ROOT_ID, "data").unwrap();
    let err = table.resolve_substore(ks, "nested").unwrap_err();
    assert!(matches!(err, TetherError::InvalidStore(_)));
}

#[test]
fn test_lookup_keyspace() {
    let table = SessionTable::new(MemStore::new());
    let id = table.resolve_keyspace(ROOT_ID, "data").unwrap();

    let ks = table.lookup_keyspace(id).expect("resolved keyspace");
    ks.kv().put(b"k", b"v", true).unwrap();
    assert_eq!(ks.kv().get(b"k").unwrap(), b"v");

    // Unknown and store descriptors miss.
    assert!(table.lookup_keyspace(999).is_none());
    assert!(table.lookup_keyspace(ROOT_ID).is_none());
}

#[test]
fn test_substore_namespaces_are_disjoint() {
    let table = SessionTable::new(MemStore::new());

    let sub = table.resolve_substore(ROOT_ID, "tenant").unwrap();
    let inner = table.resolve_keyspace(sub, "data").unwrap();
    let outer = table.resolve_keyspace(ROOT_ID, "data").unwrap();
    assert_ne!(inner, outer);

    table
        .lookup_keyspace(inner)
        .unwrap()
        .kv()
        .put(b"only-inner", b"1", true)
        .unwrap();
    assert!(!table
        .lookup_keyspace(outer)
        .unwrap()
        .kv()
        .has(b"only-inner")
        .unwrap());
}

#[test]
fn test_counts() {
    let table = SessionTable::new(MemStore::new());
    assert_eq!(table.counts(), (0, 0));

    table.resolve_keyspace(ROOT_ID, "a").unwrap();
    let sub = table.resolve_substore(ROOT_ID, "s").unwrap();
    table.resolve_keyspace(sub, "b").unwrap();
    assert_eq!(table.counts(), (2, 1));
}
