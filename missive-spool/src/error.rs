//! Error types for the missive-spool crate.
//!
//! Spool operations report persistence failures through [`SpoolError`]; payload
//! encoding problems surface as [`CodecError`] and configuration problems as
//! [`ValidationError`].

use std::io;

use thiserror::Error;

/// Top-level spool error type.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// I/O operation failed (file read/write/delete).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A payload could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// A record with the same creation key is already stored.
    #[error("A record keyed {0} already exists")]
    DuplicateKey(u64),

    /// The store has reached its configured capacity.
    #[error("Spool capacity exceeded: {len}/{capacity} records")]
    CapacityExceeded { len: usize, capacity: usize },

    /// Spool configuration or directory validation failed.
    #[error("Spool validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The backend cannot currently be reached.
    #[error("Spool unavailable: {0}")]
    Unavailable(String),

    /// Internal error (lock poisoning, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Payload encoding and decoding errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The JSON document could not be produced or parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Compressing or decompressing the payload failed.
    #[error("Compression error: {0}")]
    Compression(#[source] io::Error),
}

/// Spool configuration errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Spool path contains a `..` component.
    #[error("Spool path cannot contain '..' components: {0}")]
    ParentDirectory(String),

    /// Spool path is relative.
    #[error("Spool path must be absolute: {0}")]
    NotAbsolute(String),

    /// Spool path points into a system directory.
    #[error("Spool path cannot be in system directory {prefix}: {path}")]
    SystemDirectory { prefix: String, path: String },

    /// Spool path exists but is not a directory.
    #[error("Spool path is not a directory: {0}")]
    NotDirectory(String),
}

/// Specialized `Result` type for spool operations.
pub type Result<T> = std::result::Result<T, SpoolError>;

impl<T> From<std::sync::PoisonError<T>> for SpoolError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}
