//! Session Table
//!
//! Maps integer descriptors to the stores and keyspaces a connection has
//! opened. Descriptor 0 is always the root store supplied at construction;
//! all further descriptors come from one shared monotonically increasing
//! counter and are never reused or reassigned for the life of the session.
//!
//! ## Concurrency
//!
//! All table state sits behind a single mutex. The lock is held across the
//! collaborator call during keyspace/substore resolution — creation happens
//! at most once per distinct (parent, name) pair, typically near process
//! start, and memoization makes repeats cheap, so the coarse lock keeps the
//! exactly-once guarantee simple. Data operations (`get`, `put`, ...) only
//! touch the table through [`SessionTable::lookup_keyspace`], which clones
//! the handle out and releases the lock immediately.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, TetherError};
use crate::store::{Keyspace, Store};

/// Descriptor of the root store.
pub const ROOT_ID: u64 = 0;

/// Per-session descriptor registry.
pub struct SessionTable {
    inner: Mutex<TableInner>,
}

struct TableInner {
    /// Last descriptor handed out; 0 is the root store.
    last_id: u64,

    /// Store descriptors, root included.
    stores: HashMap<u64, StoreNode>,

    /// Keyspace descriptors, indexed directly for O(1) data dispatch.
    keyspaces: HashMap<u64, Keyspace>,
}

/// One opened store plus the name→descriptor maps of what was resolved
/// through it.
struct StoreNode {
    store: Arc<dyn Store>,
    substores: HashMap<String, u64>,
    keyspaces: HashMap<String, u64>,
}

impl StoreNode {
    fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            substores: HashMap::new(),
            keyspaces: HashMap::new(),
        }
    }
}

impl SessionTable {
    /// Create a table whose descriptor 0 is `root`.
    pub fn new(root: Arc<dyn Store>) -> Self {
        let mut stores = HashMap::new();
        stores.insert(ROOT_ID, StoreNode::new(root));
        Self {
            inner: Mutex::new(TableInner {
                last_id: ROOT_ID,
                stores,
                keyspaces: HashMap::new(),
            }),
        }
    }

    /// Resolve the keyspace named `name` within store `parent`.
    ///
    /// The first resolution of a (parent, name) pair opens the keyspace
    /// through the parent's store and registers it under a fresh
    /// descriptor; later resolutions return the memoized descriptor. A
    /// failed creation allocates no descriptor and leaves no map entry.
    pub fn resolve_keyspace(&self, parent: u64, name: &str) -> Result<u64> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let node = inner
            .stores
            .get(&parent)
            .ok_or(TetherError::InvalidStore(parent))?;
        if let Some(&id) = node.keyspaces.get(name) {
            return Ok(id);
        }
        let ks = node.store.keyspace(name).map_err(|e| {
            TetherError::Storage(format!("create keyspace {name:?} in store {parent}: {e}"))
        })?;

        inner.last_id += 1;
        let id = inner.last_id;
        inner.keyspaces.insert(id, ks);
        if let Some(node) = inner.stores.get_mut(&parent) {
            node.keyspaces.insert(name.to_string(), id);
        }
        tracing::debug!(parent, name, id, "opened keyspace");
        Ok(id)
    }

    /// Resolve the substore named `name` within store `parent`; same
    /// memoization contract as [`SessionTable::resolve_keyspace`].
    pub fn resolve_substore(&self, parent: u64, name: &str) -> Result<u64> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let node = inner
            .stores
            .get(&parent)
            .ok_or(TetherError::InvalidStore(parent))?;
        if let Some(&id) = node.substores.get(name) {
            return Ok(id);
        }
        let sub = node.store.substore(name).map_err(|e| {
            TetherError::Storage(format!("create substore {name:?} in store {parent}: {e}"))
        })?;

        inner.last_id += 1;
        let id = inner.last_id;
        inner.stores.insert(id, StoreNode::new(sub));
        if let Some(node) = inner.stores.get_mut(&parent) {
            node.substores.insert(name.to_string(), id);
        }
        tracing::debug!(parent, name, id, "opened substore");
        Ok(id)
    }

    /// Look up a keyspace descriptor. `None` signals "invalid keyspace ID"
    /// to the caller; the handle is cloned out so the table lock is not
    /// held during the data operation.
    pub fn lookup_keyspace(&self, id: u64) -> Option<Keyspace> {
        self.inner.lock().keyspaces.get(&id).cloned()
    }

    /// Number of open keyspaces and substores (root excluded).
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.keyspaces.len(), inner.stores.len() - 1)
    }

    /// Tear the session down, releasing the root store.
    pub fn close(&self) -> Result<()> {
        let root = {
            let inner = self.inner.lock();
            inner.stores.get(&ROOT_ID).map(|n| n.store.clone())
        };
        match root {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }
}
