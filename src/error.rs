//! Error types for TetherKV
//!
//! Provides a unified error type for all operations.
//!
//! Domain errors (`KeyNotFound`, `KeyExists`) carry the offending key so the
//! server can attach it to the wire error and the client can reconstruct the
//! same error on the far side. `Call` is the raw form of a protocol error as
//! it travels through the RPC channel.

use thiserror::Error;

/// Result type alias using TetherError
pub type Result<T> = std::result::Result<T, TetherError>;

/// Unified error type for TetherKV operations
#[derive(Debug, Error)]
pub enum TetherError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Wire Protocol Errors
    // -------------------------------------------------------------------------
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A protocol-level call error: numeric code, message, and optional
    /// payload (the offending key for the domain error codes).
    #[error("call failed (code {code}): {message}")]
    Call {
        code: u16,
        message: String,
        data: Vec<u8>,
    },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("key not found: {:?}", String::from_utf8_lossy(.key))]
    KeyNotFound { key: Vec<u8> },

    #[error("key exists: {:?}", String::from_utf8_lossy(.key))]
    KeyExists { key: Vec<u8> },

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("invalid store ID {0}")]
    InvalidStore(u64),

    #[error("invalid keyspace ID {0}")]
    InvalidKeyspace(u64),

    #[error("keyspace does not implement {0}")]
    MissingCapability(&'static str),

    // -------------------------------------------------------------------------
    // Collaborator Errors
    // -------------------------------------------------------------------------
    #[error("storage error: {0}")]
    Storage(String),

    #[error("network error: {0}")]
    Network(String),
}

impl TetherError {
    /// Construct a `KeyNotFound` error for the given key.
    pub fn key_not_found(key: impl Into<Vec<u8>>) -> Self {
        TetherError::KeyNotFound { key: key.into() }
    }

    /// Construct a `KeyExists` error for the given key.
    pub fn key_exists(key: impl Into<Vec<u8>>) -> Self {
        TetherError::KeyExists { key: key.into() }
    }

    /// Report whether this error is a "key not found" condition.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, TetherError::KeyNotFound { .. })
    }

    /// Report whether this error is a "key exists" condition.
    pub fn is_key_exists(&self) -> bool {
        matches!(self, TetherError::KeyExists { .. })
    }
}
