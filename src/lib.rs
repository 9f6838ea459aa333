//! # TetherKV
//!
//! A hierarchical key-value / content-addressed storage interface exposed
//! across a process boundary:
//! - Compact binary message codec (varints, length-prefixed fields, packed
//!   sizes)
//! - Server-side session table multiplexing stores and keyspaces onto
//!   integer descriptors
//! - Request dispatcher translating protocol methods into storage
//!   operations and domain errors into protocol error codes
//! - Client stub reconstructing the storage interface, with multi-round
//!   pagination and batch lookups
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────┐       ┌─────────────┐       ┌──────────────┐
//! │ RemoteStore │       │  RPC Peer   │       │   Service    │
//! │ RemoteKv    ├──────►│  (channel)  ├──────►│ (dispatcher) │
//! └─────────────┘       └─────────────┘       └──────┬───────┘
//!                                                    │
//!                                            ┌───────▼──────┐
//!                                            │ SessionTable │
//!                                            │ (descriptors)│
//!                                            └───────┬──────┘
//!                                                    │
//!                                            ┌───────▼──────┐
//!                                            │ Store / KV   │
//!                                            │ (backend)    │
//!                                            └──────────────┘
//! ```
//!
//! The transport behind the peer and the storage engine behind the store
//! are collaborators; reference implementations of both (an in-process
//! pair, a framed TCP channel, and an in-memory store) are included.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod client;
pub mod protocol;
pub mod rpc;
pub mod service;
pub mod session;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::{ListIter, RemoteKv, RemoteStore};
pub use config::{ClientConfig, ServiceConfig};
pub use error::{Result, TetherError};
pub use service::Service;
pub use session::SessionTable;
pub use store::{Keyspace, Store, KV};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TetherKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
