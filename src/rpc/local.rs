//! In-process peer pair
//!
//! Two [`Peer`]s wired back to back in one process: a call on either end
//! runs the handler registered on the other end synchronously. This is the
//! harness the test suite drives the service and client stub through
//! without touching a socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, TetherError};

use super::{Handler, Peer};

/// One end of an in-process channel; create with [`pair`].
pub struct LocalPeer {
    /// Handlers registered on this end, invoked by the other end.
    handlers: RwLock<HashMap<String, Handler>>,

    /// The other end. Weak, so dropping one side tears the pair down.
    remote: Mutex<Weak<LocalPeer>>,

    stopped: AtomicBool,
}

/// Create a connected pair of in-process peers.
pub fn pair() -> (Arc<LocalPeer>, Arc<LocalPeer>) {
    let a = Arc::new(LocalPeer::unlinked());
    let b = Arc::new(LocalPeer::unlinked());
    *a.remote.lock() = Arc::downgrade(&b);
    *b.remote.lock() = Arc::downgrade(&a);
    (a, b)
}

impl LocalPeer {
    fn unlinked() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            remote: Mutex::new(Weak::new()),
            stopped: AtomicBool::new(false),
        }
    }
}

impl Peer for LocalPeer {
    fn handle(&self, method: &str, handler: Handler) {
        self.handlers.write().insert(method.to_string(), handler);
    }

    fn call(&self, method: &str, data: &[u8]) -> Result<Vec<u8>> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(TetherError::Network("peer is stopped".to_string()));
        }
        let remote = self
            .remote
            .lock()
            .upgrade()
            .ok_or_else(|| TetherError::Network("remote peer is gone".to_string()))?;
        if remote.stopped.load(Ordering::Acquire) {
            return Err(TetherError::Network("peer is stopped".to_string()));
        }
        // Clone the handler out so the registry lock is not held across
        // the call.
        let handler = remote
            .handlers
            .read()
            .get(method)
            .cloned()
            .ok_or_else(|| TetherError::Network(format!("unknown method {method:?}")))?;
        handler(data)
    }

    fn stop(&self) -> Result<()> {
        self.stopped.store(true, Ordering::Release);
        if let Some(remote) = self.remote.lock().upgrade() {
            remote.stopped.store(true, Ordering::Release);
        }
        Ok(())
    }
}
