//! Storage collaborator interfaces
//!
//! The protocol layer is generic over the storage engine behind it. A
//! backend provides flat keyspaces ([`KV`]) and hierarchical stores
//! ([`Store`]) that hand out keyspaces and nested substores by name.
//!
//! Optional behavior is modeled as an explicit capability set: a
//! [`Keyspace`] declares at construction whether it supports
//! content-addressing and sync-diff, and the dispatcher consults that
//! declaration instead of probing with a call and catching the failure.

use std::sync::Arc;

use crate::error::Result;

mod memory;

pub use memory::{KeyspaceFactory, MemKv, MemStore, Sha1Cas};

/// One page of a cursor-based key enumeration.
///
/// `next`, when present, is the first key not included in `keys`; resuming
/// the enumeration from it (inclusive) yields the remainder with no gaps or
/// duplicates. `None` means the enumeration is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPage {
    pub keys: Vec<Vec<u8>>,
    pub next: Option<Vec<u8>>,
}

/// A single flat key-value namespace.
///
/// Keys are ordered bytewise-lexicographically; `list_page` enumerates in
/// that order. Implementations are responsible for the atomicity of each
/// single operation and for their own concurrency control.
pub trait KV: Send + Sync {
    /// Fetch the value stored under `key`, or `KeyNotFound`.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Store `value` under `key`. With `replace` false, an existing key
    /// fails with `KeyExists`.
    fn put(&self, key: &[u8], value: &[u8], replace: bool) -> Result<()>;

    /// Remove `key`, or `KeyNotFound` if it is absent.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Report whether `key` is present.
    fn has(&self, key: &[u8]) -> Result<bool>;

    /// Report the stored size of `key` in bytes, or `None` if absent.
    fn size(&self, key: &[u8]) -> Result<Option<u64>>;

    /// Return up to `limit` keys in ascending order starting at `start`
    /// (inclusive), plus the resume cursor if more remain.
    fn list_page(&self, start: &[u8], limit: usize) -> Result<KeyPage>;

    /// Total number of entries.
    fn len(&self) -> Result<u64>;
}

/// Content-addressing capability: keys derived from value content.
pub trait ContentAddressed: Send + Sync {
    /// Store `data` under its derived key and return that key.
    fn cas_put(&self, data: &[u8], prefix: &[u8], suffix: &[u8]) -> Result<Vec<u8>>;

    /// Compute the key `data` would be stored under, without storing it.
    fn cas_key(&self, data: &[u8], prefix: &[u8], suffix: &[u8]) -> Vec<u8>;
}

/// Sync-diff capability: report which of the given keys are absent.
pub trait SyncKeyer: Send + Sync {
    fn sync_keys(&self, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>>;
}

/// A keyspace handle bundling the required [`KV`] with its declared
/// optional capabilities. Cheap to clone; handles are cloned out of the
/// session table so data operations never hold its lock.
#[derive(Clone)]
pub struct Keyspace {
    kv: Arc<dyn KV>,
    cas: Option<Arc<dyn ContentAddressed>>,
    sync: Option<Arc<dyn SyncKeyer>>,
}

impl Keyspace {
    /// A keyspace with no optional capabilities.
    pub fn new(kv: Arc<dyn KV>) -> Self {
        Self {
            kv,
            cas: None,
            sync: None,
        }
    }

    /// Declare the content-addressing capability.
    pub fn with_content_addressing(mut self, cas: Arc<dyn ContentAddressed>) -> Self {
        self.cas = Some(cas);
        self
    }

    /// Declare the sync-diff capability.
    pub fn with_sync(mut self, sync: Arc<dyn SyncKeyer>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn kv(&self) -> &Arc<dyn KV> {
        &self.kv
    }

    pub fn content_addressing(&self) -> Option<&Arc<dyn ContentAddressed>> {
        self.cas.as_ref()
    }

    pub fn sync_keyer(&self) -> Option<&Arc<dyn SyncKeyer>> {
        self.sync.as_ref()
    }
}

impl std::fmt::Debug for Keyspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyspace")
            .field("content_addressing", &self.cas.is_some())
            .field("sync", &self.sync.is_some())
            .finish()
    }
}

/// A namespace that contains keyspaces and nested substores, addressed by
/// name. Opening the same name twice returns handles onto the same data.
pub trait Store: Send + Sync {
    /// Open (creating if needed) the keyspace named `name`.
    fn keyspace(&self, name: &str) -> Result<Keyspace>;

    /// Open (creating if needed) the nested store named `name`.
    fn substore(&self, name: &str) -> Result<Arc<dyn Store>>;

    /// Release any resources held by the store.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
