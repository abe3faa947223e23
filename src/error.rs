//! Centralized error types for emldag.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::hash::ContentHash;

/// Failure reported by a [`ContentStore`](crate::store::ContentStore) call.
///
/// Store errors are never retried inside the library; they abort the
/// operation that issued the call.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No object with this hash exists in the requested namespace.
    #[error("Object not found in store: {0}")]
    NotFound(ContentHash),

    /// The backing store failed to read or write.
    #[error("Store I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Any other backend-specific failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// All errors produced by the emldag library.
#[derive(Error, Debug)]
pub enum EmlError {
    /// The raw message could not be parsed. Fatal for that message.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A store-adapter call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The chunk engine cannot make progress with this bound.
    #[error("Chunk bound of {bound} bytes cannot split a {total}-byte record")]
    ChunkOverflow { bound: usize, total: usize },

    /// A size calculation was requested for an empty set of roots.
    #[error("No root hashes provided")]
    NoRootsProvided,

    /// A record could not be encoded, or stored bytes could not be decoded.
    #[error("Record encoding error: {0}")]
    Codec(String),

    /// A chunk manifest does not index its parts contiguously from zero.
    #[error("Invalid chunk manifest: {0}")]
    InvalidManifest(String),

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The operation was cancelled before completion.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Convenience alias for `Result<T, EmlError>`.
pub type Result<T> = std::result::Result<T, EmlError>;

impl EmlError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<bincode::Error> for EmlError {
    fn from(e: bincode::Error) -> Self {
        Self::Codec(e.to_string())
    }
}
