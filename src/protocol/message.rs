//! Protocol message records
//!
//! One plain record per request/response shape, each with a single
//! deterministic encoding. Field layouts are noted as:
//!
//! - `[V x]`  — varint field
//! - `[Vn n][n]` — varint length prefix followed by that many bytes
//! - `[1 x]`  — single byte
//! - `[rest x]` — raw unprefixed bytes running to end of message
//!
//! The final field of most requests is a raw remainder to avoid a redundant
//! trailing length.

use crate::error::{Result, TetherError};

use super::wire::{bytes_field, expect_end, pack_size, put_bytes, put_uvarint, unpack_size, uvarint};

/// Shared record for requests that carry an ID and one key.
///
/// Layout: `[V id][rest key]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdKeyRequest {
    pub id: u64,
    pub key: Vec<u8>,
}

pub type GetRequest = IdKeyRequest;
pub type DeleteRequest = IdKeyRequest;
pub type KeyspaceRequest = IdKeyRequest;
pub type SubRequest = IdKeyRequest;

impl IdKeyRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.key.len() + 2);
        put_uvarint(&mut buf, self.id);
        buf.extend_from_slice(&self.key);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let (id, nb) = uvarint(data)
            .map_err(|e| TetherError::Protocol(format!("invalid request (malformed ID): {e}")))?;
        Ok(Self {
            id,
            key: data[nb..].to_vec(),
        })
    }
}

/// Shared record for requests and responses that carry only an ID.
///
/// Layout: `[V id]`, strict: trailing bytes are rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdOnly {
    pub id: u64,
}

pub type LenRequest = IdOnly;
pub type KeyspaceResponse = IdOnly;
pub type SubResponse = IdOnly;

impl IdOnly {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2);
        put_uvarint(&mut buf, self.id);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let (id, nb) = uvarint(data)
            .map_err(|e| TetherError::Protocol(format!("invalid ID request (malformed ID): {e}")))?;
        expect_end(data, nb, "ID")?;
        Ok(Self { id })
    }
}

/// Arguments of the `put` method.
///
/// Layout: `[V id][1 replace][Vn klen][klen key][rest data]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutRequest {
    pub id: u64,
    pub key: Vec<u8>,
    pub data: Vec<u8>,
    pub replace: bool,
}

impl PutRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.key.len() + self.data.len() + 4);
        put_uvarint(&mut buf, self.id);
        buf.push(self.replace as u8);
        put_bytes(&mut buf, &self.key);
        buf.extend_from_slice(&self.data);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let (id, mut pos) = uvarint(data)
            .map_err(|e| TetherError::Protocol(format!("invalid put request: {e}")))?;
        let replace = match data.get(pos) {
            Some(0) => false,
            Some(1) => true,
            Some(b) => {
                return Err(TetherError::Protocol(format!(
                    "invalid put request: bad replace flag {b:#04x}"
                )))
            }
            None => {
                return Err(TetherError::Protocol(
                    "invalid put request: missing replace flag".to_string(),
                ))
            }
        };
        pos += 1;
        let (key, nb) = bytes_field(&data[pos..])
            .map_err(|e| TetherError::Protocol(format!("invalid put request: {e}")))?;
        let key = key.to_vec();
        pos += nb;
        Ok(Self {
            id,
            key,
            data: data[pos..].to_vec(),
            replace,
        })
    }
}

/// Arguments of the `list` method.
///
/// Layout: `[V id][V count][rest start]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub id: u64,
    pub start: Vec<u8>,
    pub count: u64,
}

impl ListRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.start.len() + 4);
        put_uvarint(&mut buf, self.id);
        put_uvarint(&mut buf, self.count);
        buf.extend_from_slice(&self.start);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let (id, nb) = uvarint(data)
            .map_err(|e| TetherError::Protocol(format!("invalid list request: {e}")))?;
        let (count, nc) = uvarint(&data[nb..])
            .map_err(|e| TetherError::Protocol(format!("invalid list request: {e}")))?;
        Ok(Self {
            id,
            count,
            start: data[nb + nc..].to_vec(),
        })
    }
}

/// Response of the `list` method.
///
/// Layout: `[Vn nlen][nlen next] |: [Vk klen][klen key] :|`
///
/// An empty `next` means the listing is complete; otherwise `next` is the
/// first key not included in `keys`, and resuming from it yields the
/// remainder with no gaps or duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResponse {
    pub keys: Vec<Vec<u8>>,
    pub next: Vec<u8>,
}

impl ListResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_bytes(&mut buf, &self.next);
        for key in &self.keys {
            put_bytes(&mut buf, key);
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let (next, mut pos) = bytes_field(data)
            .map_err(|e| TetherError::Protocol(format!("invalid list response (next-key): {e}")))?;
        let next = next.to_vec();
        let mut keys = Vec::new();
        while pos < data.len() {
            let (key, nb) = bytes_field(&data[pos..])
                .map_err(|e| TetherError::Protocol(format!("invalid list response (key): {e}")))?;
            keys.push(key.to_vec());
            pos += nb;
        }
        Ok(Self { keys, next })
    }
}

/// Arguments of the `cas-put` and `cas-key` methods.
///
/// Layout: `[V id][Vp plen][plen prefix][Vs slen][slen suffix][rest data]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CasPutRequest {
    pub id: u64,
    pub data: Vec<u8>,
    pub prefix: Vec<u8>,
    pub suffix: Vec<u8>,
}

pub type CasKeyRequest = CasPutRequest;

impl CasPutRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf =
            Vec::with_capacity(self.prefix.len() + self.suffix.len() + self.data.len() + 6);
        put_uvarint(&mut buf, self.id);
        put_bytes(&mut buf, &self.prefix);
        put_bytes(&mut buf, &self.suffix);
        buf.extend_from_slice(&self.data);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let (id, mut pos) = uvarint(data)
            .map_err(|e| TetherError::Protocol(format!("invalid cas request: {e}")))?;
        let (prefix, nb) = bytes_field(&data[pos..])
            .map_err(|e| TetherError::Protocol(format!("invalid cas request (prefix): {e}")))?;
        let prefix = prefix.to_vec();
        pos += nb;
        let (suffix, nb) = bytes_field(&data[pos..])
            .map_err(|e| TetherError::Protocol(format!("invalid cas request (suffix): {e}")))?;
        let suffix = suffix.to_vec();
        pos += nb;
        Ok(Self {
            id,
            prefix,
            suffix,
            data: data[pos..].to_vec(),
        })
    }
}

/// Shared record for requests that carry an ID and a key list.
///
/// Layout: `[V id] |: [Vk klen][klen key] :|`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeysRequest {
    pub id: u64,
    pub keys: Vec<Vec<u8>>,
}

pub type HasRequest = KeysRequest;
pub type StatRequest = KeysRequest;
pub type SyncKeysRequest = KeysRequest;

impl KeysRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_uvarint(&mut buf, self.id);
        for key in &self.keys {
            put_bytes(&mut buf, key);
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let (id, mut pos) = uvarint(data)
            .map_err(|e| TetherError::Protocol(format!("invalid key-list request: {e}")))?;
        let mut keys = Vec::new();
        while pos < data.len() {
            let (key, nb) = bytes_field(&data[pos..])
                .map_err(|e| TetherError::Protocol(format!("invalid key-list request (key): {e}")))?;
            keys.push(key.to_vec());
            pos += nb;
        }
        Ok(Self { id, keys })
    }
}

/// Bare key list; the `sync-keys` response (keys missing from the keyspace).
///
/// Layout: `|: [Vk klen][klen key] :|`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyList {
    pub keys: Vec<Vec<u8>>,
}

pub type SyncKeysResponse = KeyList;

impl KeyList {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for key in &self.keys {
            put_bytes(&mut buf, key);
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut keys = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let (key, nb) = bytes_field(&data[pos..])
                .map_err(|e| TetherError::Protocol(format!("invalid key list (key): {e}")))?;
            keys.push(key.to_vec());
            pos += nb;
        }
        Ok(Self { keys })
    }
}

/// One `stat` result: a key that exists and its size in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatEntry {
    pub key: Vec<u8>,
    pub size: u64,
}

/// Response of the `stat` method. Keys absent from the keyspace are simply
/// not listed; sizes use the packed big-endian encoding.
///
/// Layout: `|: [Vk klen][klen key][Vs slen][slen packed-size] :|`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatResponse {
    pub entries: Vec<StatEntry>,
}

impl StatResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for entry in &self.entries {
            put_bytes(&mut buf, &entry.key);
            put_bytes(&mut buf, &pack_size(entry.size));
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let (key, nb) = bytes_field(&data[pos..])
                .map_err(|e| TetherError::Protocol(format!("invalid stat response (key): {e}")))?;
            let key = key.to_vec();
            pos += nb;
            let (packed, nb) = bytes_field(&data[pos..])
                .map_err(|e| TetherError::Protocol(format!("invalid stat response (size): {e}")))?;
            let size = unpack_size(packed)
                .map_err(|e| TetherError::Protocol(format!("invalid stat response (size): {e}")))?;
            pos += nb;
            entries.push(StatEntry { key, size });
        }
        Ok(Self { entries })
    }
}
