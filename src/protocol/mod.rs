//! Protocol Module
//!
//! Defines the wire protocol spoken between the client stub and the
//! server-side service.
//!
//! ## Method Set
//!
//! Keyspace (data) methods, addressed by keyspace descriptor:
//! `get`, `put`, `delete`, `has`, `stat`, `list`, `len`, `cas-put`,
//! `cas-key`, `sync-keys`.
//!
//! Store (session) methods, addressed by store descriptor:
//! `keyspace`, `sub`. Metadata: `status`.
//!
//! ## Encoding Conventions
//!
//! - Descriptors, counts, and length prefixes are varints (base-128, most
//!   significant group first, continuation bit high on all but the last
//!   byte).
//! - Byte strings occurring mid-message are varint-length-prefixed; the
//!   final field of most requests is raw bytes running to end of message.
//! - `len` responses and `stat` sizes use the packed minimal big-endian
//!   encoding, zero as a single zero byte.
//! - `has` responses are a packed bit vector, one bit per requested key in
//!   request order.

pub mod message;
pub mod wire;

pub use message::{
    CasKeyRequest, CasPutRequest, DeleteRequest, GetRequest, HasRequest, IdKeyRequest, IdOnly,
    KeyList, KeysRequest, KeyspaceRequest, KeyspaceResponse, LenRequest, ListRequest,
    ListResponse, PutRequest, StatEntry, StatRequest, StatResponse, SubRequest, SubResponse,
    SyncKeysRequest, SyncKeysResponse,
};
pub use wire::{pack_bits, pack_size, unpack_bits, unpack_size};

/// Protocol error code for "key exists" (put with replace=false).
pub const CODE_KEY_EXISTS: u16 = 400;

/// Protocol error code for "key not found".
pub const CODE_KEY_NOT_FOUND: u16 = 404;

// Method name constants. A service may prepend a configured prefix to all
// of these so that several instances can share one channel.

pub const M_STATUS: &str = "status";

pub const M_GET: &str = "get";
pub const M_PUT: &str = "put";
pub const M_DELETE: &str = "delete";
pub const M_HAS: &str = "has";
pub const M_STAT: &str = "stat";
pub const M_LIST: &str = "list";
pub const M_LEN: &str = "len";
pub const M_CAS_PUT: &str = "cas-put";
pub const M_CAS_KEY: &str = "cas-key";
pub const M_SYNC_KEYS: &str = "sync-keys";

pub const M_KEYSPACE: &str = "keyspace";
pub const M_SUB: &str = "sub";
