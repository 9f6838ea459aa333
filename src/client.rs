//! Client Stub
//!
//! Reconstructs the storage interface over an RPC peer. Each logical
//! operation is one call, with two multi-round exceptions: `list` drives
//! pagination by resuming from the server's continuation key, and the
//! batch lookups (`has`, `stat`) send the whole key list in one call and
//! re-attribute results to input positions on this side.
//!
//! Protocol error codes are translated back into the domain errors they
//! were produced from, key payload included, so a "not found" raised for
//! key K on the server is indistinguishable from one raised locally.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::{Result, TetherError};
use crate::protocol::{
    wire, CasPutRequest, IdKeyRequest, IdOnly, KeyList, KeysRequest, ListRequest, ListResponse,
    PutRequest, StatResponse, CODE_KEY_EXISTS, CODE_KEY_NOT_FOUND, M_CAS_KEY, M_CAS_PUT, M_DELETE,
    M_GET, M_HAS, M_KEYSPACE, M_LEN, M_LIST, M_PUT, M_STAT, M_STATUS, M_SUB, M_SYNC_KEYS,
};
use crate::rpc::Peer;
use crate::session::ROOT_ID;

/// Client handle onto a store served by a remote [`crate::Service`].
///
/// The handle constructed by [`RemoteStore::new`] addresses the root store
/// (descriptor 0); nested handles come from [`RemoteStore::substore`].
#[derive(Clone)]
pub struct RemoteStore {
    peer: Arc<dyn Peer>,
    prefix: String,
    id: u64,
}

impl RemoteStore {
    /// A handle onto the remote root store.
    pub fn new(peer: Arc<dyn Peer>, config: ClientConfig) -> Self {
        Self {
            peer,
            prefix: config.prefix,
            id: ROOT_ID,
        }
    }

    /// This store's descriptor.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Open (creating if needed) the keyspace named `name` in this store.
    pub fn keyspace(&self, name: &str) -> Result<RemoteKv> {
        let req = IdKeyRequest {
            id: self.id,
            key: name.as_bytes().to_vec(),
        };
        let rsp = self.call(M_KEYSPACE, req.encode())?;
        let id = IdOnly::decode(&rsp)?.id;
        Ok(RemoteKv {
            peer: Arc::clone(&self.peer),
            prefix: self.prefix.clone(),
            id,
        })
    }

    /// Open (creating if needed) the substore named `name` in this store.
    pub fn substore(&self, name: &str) -> Result<RemoteStore> {
        let req = IdKeyRequest {
            id: self.id,
            key: name.as_bytes().to_vec(),
        };
        let rsp = self.call(M_SUB, req.encode())?;
        let id = IdOnly::decode(&rsp)?.id;
        Ok(RemoteStore {
            peer: Arc::clone(&self.peer),
            prefix: self.prefix.clone(),
            id,
        })
    }

    /// Fetch the server's opaque status blob.
    pub fn status(&self) -> Result<Vec<u8>> {
        self.call(M_STATUS, Vec::new())
    }

    /// Close the store by stopping the underlying channel.
    pub fn close(&self) -> Result<()> {
        self.peer.stop()
    }

    fn call(&self, method: &str, data: Vec<u8>) -> Result<Vec<u8>> {
        self.peer
            .call(&format!("{}{}", self.prefix, method), &data)
            .map_err(unfilter_err)
    }
}

/// Client handle onto one remote keyspace.
#[derive(Clone)]
pub struct RemoteKv {
    peer: Arc<dyn Peer>,
    prefix: String,
    id: u64,
}

impl RemoteKv {
    /// This keyspace's descriptor.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Fetch the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let req = IdKeyRequest {
            id: self.id,
            key: key.to_vec(),
        };
        self.call(M_GET, req.encode())
    }

    /// Store `value` under `key`. With `replace` false, an existing key
    /// fails with `KeyExists`.
    pub fn put(&self, key: &[u8], value: &[u8], replace: bool) -> Result<()> {
        let req = PutRequest {
            id: self.id,
            key: key.to_vec(),
            data: value.to_vec(),
            replace,
        };
        self.call(M_PUT, req.encode())?;
        Ok(())
    }

    /// Remove `key`.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let req = IdKeyRequest {
            id: self.id,
            key: key.to_vec(),
        };
        self.call(M_DELETE, req.encode())?;
        Ok(())
    }

    /// Existence flags for `keys`, one per input position, duplicates and
    /// all.
    pub fn has<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<Vec<bool>> {
        let req = KeysRequest {
            id: self.id,
            keys: keys.iter().map(|k| k.as_ref().to_vec()).collect(),
        };
        let rsp = self.call(M_HAS, req.encode())?;
        wire::unpack_bits(&rsp, keys.len())
    }

    /// Stored sizes for `keys`, attributed to input positions by key
    /// equality; `None` marks keys the keyspace does not contain.
    pub fn stat<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<Vec<Option<u64>>> {
        let req = KeysRequest {
            id: self.id,
            keys: keys.iter().map(|k| k.as_ref().to_vec()).collect(),
        };
        let rsp = StatResponse::decode(&self.call(M_STAT, req.encode())?)?;
        let sizes: HashMap<Vec<u8>, u64> =
            rsp.entries.into_iter().map(|e| (e.key, e.size)).collect();
        Ok(keys
            .iter()
            .map(|k| sizes.get(k.as_ref()).copied())
            .collect())
    }

    /// Lazily enumerate keys in ascending order starting at `start`
    /// (inclusive).
    ///
    /// Each page is fetched on demand; dropping the iterator early leaks
    /// nothing on the server, since the cursor is reconstructed from the
    /// last delivered key rather than held server-side.
    pub fn list(&self, start: &[u8]) -> ListIter<'_> {
        ListIter {
            kv: self,
            buffer: VecDeque::new(),
            cursor: Some(start.to_vec()),
        }
    }

    /// Enumerate all keys from the beginning of the keyspace.
    pub fn keys(&self) -> ListIter<'_> {
        self.list(&[])
    }

    /// Total number of entries.
    pub fn len(&self) -> Result<u64> {
        let req = IdOnly { id: self.id };
        let rsp = self.call(M_LEN, req.encode())?;
        wire::unpack_size(&rsp)
    }

    /// Store `data` under its content-derived key and return that key.
    pub fn cas_put(&self, data: &[u8], prefix: &[u8], suffix: &[u8]) -> Result<Vec<u8>> {
        let req = CasPutRequest {
            id: self.id,
            data: data.to_vec(),
            prefix: prefix.to_vec(),
            suffix: suffix.to_vec(),
        };
        self.call(M_CAS_PUT, req.encode())
    }

    /// Compute the content-derived key for `data` without storing it.
    pub fn cas_key(&self, data: &[u8], prefix: &[u8], suffix: &[u8]) -> Result<Vec<u8>> {
        let req = CasPutRequest {
            id: self.id,
            data: data.to_vec(),
            prefix: prefix.to_vec(),
            suffix: suffix.to_vec(),
        };
        self.call(M_CAS_KEY, req.encode())
    }

    /// Report which of `keys` the keyspace does not contain.
    pub fn sync_keys<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<Vec<Vec<u8>>> {
        let req = KeysRequest {
            id: self.id,
            keys: keys.iter().map(|k| k.as_ref().to_vec()).collect(),
        };
        let rsp = KeyList::decode(&self.call(M_SYNC_KEYS, req.encode())?)?;
        Ok(rsp.keys)
    }

    fn call(&self, method: &str, data: Vec<u8>) -> Result<Vec<u8>> {
        self.peer
            .call(&format!("{}{}", self.prefix, method), &data)
            .map_err(unfilter_err)
    }

    fn fetch_page(&self, start: &[u8]) -> Result<ListResponse> {
        let req = ListRequest {
            id: self.id,
            start: start.to_vec(),
            count: 0,
        };
        ListResponse::decode(&self.call(M_LIST, req.encode())?)
    }
}

/// Lazy key enumeration over a [`RemoteKv`]; see [`RemoteKv::list`].
pub struct ListIter<'a> {
    kv: &'a RemoteKv,
    buffer: VecDeque<Vec<u8>>,
    /// Start key of the next page to fetch; `None` once exhausted.
    cursor: Option<Vec<u8>>,
}

impl Iterator for ListIter<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(key) = self.buffer.pop_front() {
            return Some(Ok(key));
        }
        let start = self.cursor.take()?;
        let rsp = match self.kv.fetch_page(&start) {
            Ok(rsp) => rsp,
            Err(e) => return Some(Err(e)),
        };
        // Empty batch means end of keyspace regardless of the cursor.
        if rsp.keys.is_empty() {
            return None;
        }
        self.buffer.extend(rsp.keys);
        if !rsp.next.is_empty() {
            self.cursor = Some(rsp.next);
        }
        self.buffer.pop_front().map(Ok)
    }
}

/// Reverse the server's error translation: protocol error codes become the
/// domain errors they were produced from, key payload included.
/// Unrecognized codes and transport failures pass through unmodified.
fn unfilter_err(err: TetherError) -> TetherError {
    match err {
        TetherError::Call { code, data, .. } if code == CODE_KEY_NOT_FOUND => {
            TetherError::KeyNotFound { key: data }
        }
        TetherError::Call { code, data, .. } if code == CODE_KEY_EXISTS => {
            TetherError::KeyExists { key: data }
        }
        other => other,
    }
}
