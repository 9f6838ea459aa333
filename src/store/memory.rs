//! In-memory storage backend
//!
//! Reference implementation of the storage collaborator traits, used by the
//! test suite and the demo server binary. Keyspaces live in a
//! `BTreeMap` behind an RwLock (many concurrent readers, exclusive writer),
//! so enumeration order is the required bytewise-lexicographic order for
//! free.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sha1::{Digest, Sha1};

use crate::error::{Result, TetherError};

use super::{ContentAddressed, KeyPage, Keyspace, Store, SyncKeyer, KV};

/// Factory producing the keyspaces a [`MemStore`] hands out.
pub type KeyspaceFactory = Arc<dyn Fn() -> Keyspace + Send + Sync>;

/// A flat in-memory key-value namespace.
pub struct MemKv {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemKv {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Seed the keyspace from string pairs (test convenience).
    pub fn init<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        {
            let mut entries = self.entries.write();
            for (k, v) in pairs {
                entries.insert(k.into(), v.into());
            }
        }
        self
    }
}

impl Default for MemKv {
    fn default() -> Self {
        Self::new()
    }
}

impl KV for MemKv {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| TetherError::key_not_found(key))
    }

    fn put(&self, key: &[u8], value: &[u8], replace: bool) -> Result<()> {
        let mut entries = self.entries.write();
        if !replace && entries.contains_key(key) {
            return Err(TetherError::key_exists(key));
        }
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        match self.entries.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(TetherError::key_not_found(key)),
        }
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn size(&self, key: &[u8]) -> Result<Option<u64>> {
        Ok(self.entries.read().get(key).map(|v| v.len() as u64))
    }

    fn list_page(&self, start: &[u8], limit: usize) -> Result<KeyPage> {
        let entries = self.entries.read();
        let mut page = KeyPage::default();
        for key in entries
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .map(|(k, _)| k)
        {
            if page.keys.len() == limit {
                page.next = Some(key.clone());
                break;
            }
            page.keys.push(key.clone());
        }
        Ok(page)
    }

    fn len(&self) -> Result<u64> {
        Ok(self.entries.read().len() as u64)
    }
}

impl SyncKeyer for MemKv {
    fn sync_keys(&self, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        let entries = self.entries.read();
        Ok(keys
            .iter()
            .filter(|k| !entries.contains_key(k.as_slice()))
            .cloned()
            .collect())
    }
}

/// SHA-1 content addressing over any [`KV`].
///
/// The derived key is `prefix ‖ SHA-1(data) ‖ suffix`; `cas_put` always
/// replaces, since identical content hashes to an identical key.
pub struct Sha1Cas {
    kv: Arc<dyn KV>,
}

impl Sha1Cas {
    pub fn new(kv: Arc<dyn KV>) -> Self {
        Self { kv }
    }
}

impl ContentAddressed for Sha1Cas {
    fn cas_put(&self, data: &[u8], prefix: &[u8], suffix: &[u8]) -> Result<Vec<u8>> {
        let key = self.cas_key(data, prefix, suffix);
        self.kv.put(&key, data, true)?;
        Ok(key)
    }

    fn cas_key(&self, data: &[u8], prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
        let digest = Sha1::digest(data);
        let mut key = Vec::with_capacity(prefix.len() + digest.len() + suffix.len());
        key.extend_from_slice(prefix);
        key.extend_from_slice(&digest);
        key.extend_from_slice(suffix);
        key
    }
}

/// A hierarchical in-memory store.
///
/// Keyspaces and substores are created on first reference to a name and
/// memoized, so repeated opens return handles onto the same data. The
/// keyspace factory decides which capabilities new keyspaces declare.
pub struct MemStore {
    factory: KeyspaceFactory,
    inner: Mutex<MemStoreInner>,
}

#[derive(Default)]
struct MemStoreInner {
    keyspaces: HashMap<String, Keyspace>,
    substores: HashMap<String, Arc<MemStore>>,
}

impl MemStore {
    /// A store whose keyspaces are plain [`MemKv`]s with the sync-diff
    /// capability.
    pub fn new() -> Arc<Self> {
        Self::with_factory(Arc::new(|| {
            let kv = Arc::new(MemKv::new());
            Keyspace::new(kv.clone()).with_sync(kv)
        }))
    }

    /// A store whose keyspaces additionally declare SHA-1 content
    /// addressing.
    pub fn content_addressed() -> Arc<Self> {
        Self::with_factory(Arc::new(|| {
            let kv = Arc::new(MemKv::new());
            let cas = Arc::new(Sha1Cas::new(kv.clone()));
            Keyspace::new(kv.clone())
                .with_content_addressing(cas)
                .with_sync(kv)
        }))
    }

    /// A store producing keyspaces from a custom factory.
    pub fn with_factory(factory: KeyspaceFactory) -> Arc<Self> {
        Arc::new(Self {
            factory,
            inner: Mutex::new(MemStoreInner::default()),
        })
    }
}

impl Store for MemStore {
    fn keyspace(&self, name: &str) -> Result<Keyspace> {
        let mut inner = self.inner.lock();
        if let Some(ks) = inner.keyspaces.get(name) {
            return Ok(ks.clone());
        }
        let ks = (self.factory)();
        inner.keyspaces.insert(name.to_string(), ks.clone());
        Ok(ks)
    }

    fn substore(&self, name: &str) -> Result<Arc<dyn Store>> {
        let mut inner = self.inner.lock();
        if let Some(sub) = inner.substores.get(name) {
            return Ok(sub.clone());
        }
        let sub = MemStore::with_factory(self.factory.clone());
        inner.substores.insert(name.to_string(), sub.clone());
        Ok(sub)
    }
}
