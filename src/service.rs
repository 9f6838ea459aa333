//! Request Dispatcher
//!
//! Binds protocol method names to handlers on an RPC peer. Every handler
//! follows the same shape:
//!
//! 1. Decode the request — malformed input fails locally, the storage
//!    collaborator is never invoked.
//! 2. Resolve the target descriptor through the session table — an unknown
//!    descriptor is a protocol error scoped to the one call, never fatal to
//!    the session.
//! 3. Invoke the storage operation.
//! 4. Encode the response, translating domain errors to protocol error
//!    codes (400 key exists, 404 key not found) with the offending key as
//!    payload so the client can reconstruct the exact error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::ServiceConfig;
use crate::error::{Result, TetherError};
use crate::protocol::{
    wire, CasPutRequest, DeleteRequest, GetRequest, IdOnly, KeyList, KeysRequest, KeyspaceRequest,
    ListRequest, ListResponse, PutRequest, StatEntry, StatResponse, SubRequest, CODE_KEY_EXISTS,
    CODE_KEY_NOT_FOUND, M_CAS_KEY, M_CAS_PUT, M_DELETE, M_GET, M_HAS, M_KEYSPACE, M_LEN, M_LIST,
    M_PUT, M_STAT, M_STATUS, M_SUB, M_SYNC_KEYS,
};
use crate::rpc::{Handler, Peer};
use crate::session::SessionTable;
use crate::store::{Keyspace, Store};

/// Server-side protocol service delegating to a root [`Store`].
pub struct Service {
    prefix: String,
    list_page_size: usize,
    table: SessionTable,
    metrics: ServiceMetrics,
}

impl Service {
    /// Construct a service over the given root store.
    pub fn new(root: Arc<dyn Store>, config: ServiceConfig) -> Arc<Self> {
        Arc::new(Self {
            prefix: config.prefix,
            list_page_size: config.list_page_size,
            table: SessionTable::new(root),
            metrics: ServiceMetrics::default(),
        })
    }

    fn method(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Register a handler for each protocol method on `peer`.
    pub fn register(self: &Arc<Self>, peer: &dyn Peer) {
        peer.handle(&self.method(M_STATUS), self.handler(Self::status));
        peer.handle(&self.method(M_GET), self.handler(Self::get));
        peer.handle(&self.method(M_PUT), self.handler(Self::put));
        peer.handle(&self.method(M_DELETE), self.handler(Self::delete));
        peer.handle(&self.method(M_HAS), self.handler(Self::has));
        peer.handle(&self.method(M_STAT), self.handler(Self::stat));
        peer.handle(&self.method(M_LIST), self.handler(Self::list));
        peer.handle(&self.method(M_LEN), self.handler(Self::len));
        peer.handle(&self.method(M_CAS_PUT), self.handler(Self::cas_put));
        peer.handle(&self.method(M_CAS_KEY), self.handler(Self::cas_key));
        peer.handle(&self.method(M_SYNC_KEYS), self.handler(Self::sync_keys));
        peer.handle(&self.method(M_KEYSPACE), self.handler(Self::keyspace));
        peer.handle(&self.method(M_SUB), self.handler(Self::sub));
    }

    /// Wrap a handler method with metrics accounting and error
    /// translation.
    fn handler(self: &Arc<Self>, f: fn(&Service, &[u8]) -> Result<Vec<u8>>) -> Handler {
        let svc = Arc::clone(self);
        Arc::new(move |data: &[u8]| {
            svc.metrics.calls.fetch_add(1, Ordering::Relaxed);
            f(&svc, data).map_err(|e| {
                svc.metrics.failures.fetch_add(1, Ordering::Relaxed);
                filter_err(e)
            })
        })
    }

    /// Tear down the session, releasing the root store.
    pub fn close(&self) -> Result<()> {
        self.table.close()
    }

    /// Current service metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        let (keyspaces, substores) = self.table.counts();
        MetricsSnapshot {
            calls: self.metrics.calls.load(Ordering::Relaxed),
            failures: self.metrics.failures.load(Ordering::Relaxed),
            keyspaces,
            substores,
        }
    }

    fn keyspace_handle(&self, id: u64) -> Result<Keyspace> {
        self.table
            .lookup_keyspace(id)
            .ok_or(TetherError::InvalidKeyspace(id))
    }

    // =========================================================================
    // Keyspace (data) methods
    // =========================================================================

    fn get(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = GetRequest::decode(data)?;
        let ks = self.keyspace_handle(req.id)?;
        ks.kv().get(&req.key)
    }

    fn put(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = PutRequest::decode(data)?;
        let ks = self.keyspace_handle(req.id)?;
        ks.kv().put(&req.key, &req.data, req.replace)?;
        Ok(Vec::new())
    }

    fn delete(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = DeleteRequest::decode(data)?;
        let ks = self.keyspace_handle(req.id)?;
        ks.kv().delete(&req.key)?;
        Ok(Vec::new())
    }

    /// One bit per requested key, in request order.
    fn has(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = KeysRequest::decode(data)?;
        let ks = self.keyspace_handle(req.id)?;
        let mut bits = Vec::with_capacity(req.keys.len());
        for key in &req.keys {
            bits.push(ks.kv().has(key)?);
        }
        Ok(wire::pack_bits(&bits))
    }

    /// Sizes for the requested keys that exist; absent keys are simply not
    /// listed.
    fn stat(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = KeysRequest::decode(data)?;
        let ks = self.keyspace_handle(req.id)?;
        let mut rsp = StatResponse::default();
        for key in &req.keys {
            if let Some(size) = ks.kv().size(key)? {
                rsp.entries.push(StatEntry {
                    key: key.clone(),
                    size,
                });
            }
        }
        Ok(rsp.encode())
    }

    fn list(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = ListRequest::decode(data)?;
        let ks = self.keyspace_handle(req.id)?;
        let limit = match req.count {
            0 => self.list_page_size,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };
        let page = ks.kv().list_page(&req.start, limit)?;
        Ok(ListResponse {
            keys: page.keys,
            next: page.next.unwrap_or_default(),
        }
        .encode())
    }

    fn len(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = IdOnly::decode(data)?;
        let ks = self.keyspace_handle(req.id)?;
        Ok(wire::pack_size(ks.kv().len()?))
    }

    fn cas_put(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = CasPutRequest::decode(data)?;
        let ks = self.keyspace_handle(req.id)?;
        let cas = ks
            .content_addressing()
            .ok_or(TetherError::MissingCapability("content addressing"))?;
        cas.cas_put(&req.data, &req.prefix, &req.suffix)
    }

    fn cas_key(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = CasPutRequest::decode(data)?;
        let ks = self.keyspace_handle(req.id)?;
        let cas = ks
            .content_addressing()
            .ok_or(TetherError::MissingCapability("content addressing"))?;
        Ok(cas.cas_key(&req.data, &req.prefix, &req.suffix))
    }

    /// Report which of the given keys are absent. Uses the keyspace's
    /// declared sync-diff capability when present, otherwise falls back to
    /// per-key existence checks.
    fn sync_keys(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = KeysRequest::decode(data)?;
        let ks = self.keyspace_handle(req.id)?;
        let missing = match ks.sync_keyer() {
            Some(sync) => sync.sync_keys(&req.keys)?,
            None => {
                let mut missing = Vec::new();
                for key in &req.keys {
                    if !ks.kv().has(key)? {
                        missing.push(key.clone());
                    }
                }
                missing
            }
        };
        Ok(KeyList { keys: missing }.encode())
    }

    // =========================================================================
    // Store (session) methods
    // =========================================================================

    fn keyspace(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = KeyspaceRequest::decode(data)?;
        let name = utf8_name(&req.key)?;
        let id = self.table.resolve_keyspace(req.id, name)?;
        Ok(IdOnly { id }.encode())
    }

    fn sub(&self, data: &[u8]) -> Result<Vec<u8>> {
        let req = SubRequest::decode(data)?;
        let name = utf8_name(&req.key)?;
        let id = self.table.resolve_substore(req.id, name)?;
        Ok(IdOnly { id }.encode())
    }

    /// Opaque JSON blob of server metrics; not part of the storage
    /// contract.
    fn status(&self, _data: &[u8]) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.metrics())
            .map_err(|e| TetherError::Protocol(format!("status encoding: {e}")))
    }
}

fn utf8_name(raw: &[u8]) -> Result<&str> {
    std::str::from_utf8(raw)
        .map_err(|_| TetherError::Protocol("name is not valid UTF-8".to_string()))
}

/// Translate domain errors raised by the storage collaborator into protocol
/// call errors carrying the offending key. Everything else propagates with
/// its message, uninterpreted.
fn filter_err(err: TetherError) -> TetherError {
    match err {
        TetherError::KeyNotFound { key } => TetherError::Call {
            code: CODE_KEY_NOT_FOUND,
            message: "key not found".to_string(),
            data: key,
        },
        TetherError::KeyExists { key } => TetherError::Call {
            code: CODE_KEY_EXISTS,
            message: "key exists".to_string(),
            data: key,
        },
        other => other,
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Call counters kept by the service.
#[derive(Debug, Default)]
struct ServiceMetrics {
    calls: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time view of the service counters, serialized as the `status`
/// response.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub calls: u64,
    pub failures: u64,
    pub keyspaces: usize,
    pub substores: usize,
}
