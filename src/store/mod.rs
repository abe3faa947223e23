//! Content-addressed store adapter.
//!
//! The converter only ever talks to a [`ContentStore`]. Two backends ship
//! with the crate: [`MemoryStore`] for tests and benchmarks, and
//! [`FsStore`], a content-addressed directory used by the CLI.

pub mod fs;
pub mod memory;

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::model::hash::ContentHash;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Result type for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Primitive operations of a content-addressed store.
///
/// Every call is a blocking round trip. Implementations must map identical
/// bytes to the identical hash within a namespace, and must not retry.
pub trait ContentStore {
    /// Store a whole blob and return its hash.
    fn put(&self, data: &[u8]) -> StoreResult<ContentHash>;

    /// Fetch a whole blob.
    fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>>;

    /// Store a raw DAG node (no filename or metadata) and return its hash.
    fn dag_put(&self, data: &[u8]) -> StoreResult<ContentHash>;

    /// Fetch a raw DAG node.
    fn dag_get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>>;

    /// Storage footprint attributable to a hash, in bytes.
    fn stat(&self, hash: &ContentHash) -> StoreResult<u64>;
}

impl<S: ContentStore + ?Sized> ContentStore for &S {
    fn put(&self, data: &[u8]) -> StoreResult<ContentHash> {
        (**self).put(data)
    }
    fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        (**self).get(hash)
    }
    fn dag_put(&self, data: &[u8]) -> StoreResult<ContentHash> {
        (**self).dag_put(data)
    }
    fn dag_get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        (**self).dag_get(hash)
    }
    fn stat(&self, hash: &ContentHash) -> StoreResult<u64> {
        (**self).stat(hash)
    }
}

impl<S: ContentStore + ?Sized> ContentStore for Arc<S> {
    fn put(&self, data: &[u8]) -> StoreResult<ContentHash> {
        (**self).put(data)
    }
    fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        (**self).get(hash)
    }
    fn dag_put(&self, data: &[u8]) -> StoreResult<ContentHash> {
        (**self).dag_put(data)
    }
    fn dag_get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        (**self).dag_get(hash)
    }
    fn stat(&self, hash: &ContentHash) -> StoreResult<u64> {
        (**self).stat(hash)
    }
}

/// Which family of objects a hash addresses.
///
/// Blobs and DAG nodes hash differently even for identical bytes, the way
/// a file object and a raw node of the same content get different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Blob,
    Node,
}

impl Namespace {
    fn tag(self) -> u8 {
        match self {
            Namespace::Blob => b'b',
            Namespace::Node => b'n',
        }
    }

    /// Directory name used by [`FsStore`].
    pub fn dir_name(self) -> &'static str {
        match self {
            Namespace::Blob => "blobs",
            Namespace::Node => "nodes",
        }
    }
}

/// SHA-256 over the namespace tag and the bytes, as 64 lowercase hex chars.
pub fn content_hash(namespace: Namespace, data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update([namespace.tag()]);
    hasher.update(data);
    ContentHash::new(format!("{:x}", hasher.finalize()))
}
