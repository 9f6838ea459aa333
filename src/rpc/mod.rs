//! RPC channel seam
//!
//! The transport proper (connection management, request correlation,
//! cancellation, retries) is a collaborator, not part of this crate's
//! core; [`Peer`] is the seam it plugs into. Two reference implementations
//! are provided:
//!
//! - [`local`]: an in-process peer pair, used by the test suite
//! - [`tcp`]: a minimal framed TCP transport for the server and CLI
//!   binaries
//!
//! Handlers and calls exchange raw message payloads; protocol errors
//! travel as [`crate::TetherError::Call`] values with a numeric code, a
//! message, and an optional data payload.

use std::sync::Arc;

use crate::error::Result;

pub mod local;
pub mod tcp;

/// A request handler bound to one method name.
pub type Handler = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync>;

/// One end of an RPC channel.
///
/// A peer is shared by arbitrarily many concurrent logical operations; the
/// implementation is responsible for correlating concurrent requests with
/// their responses. Calls do not retry: transport failures surface to the
/// caller unmodified.
pub trait Peer: Send + Sync {
    /// Register `handler` for calls to `method` arriving from the remote
    /// end.
    fn handle(&self, method: &str, handler: Handler);

    /// Issue a call to `method` on the remote end and wait for its
    /// response payload.
    fn call(&self, method: &str, data: &[u8]) -> Result<Vec<u8>>;

    /// Stop the channel. In-flight and subsequent calls fail.
    fn stop(&self) -> Result<()>;
}
