//! In-process content store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use super::{content_hash, ContentStore, Namespace, StoreResult};
use crate::error::StoreError;
use crate::model::hash::ContentHash;

/// Content store kept entirely in memory.
///
/// `stat` reports the stored byte length, so a hash stored twice still
/// counts once.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<ContentHash, (Namespace, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct objects held.
    pub fn len(&self) -> usize {
        self.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the sizes of every distinct object held.
    pub fn total_bytes(&self) -> u64 {
        self.lock()
            .map(|objects| objects.values().map(|(_, data)| data.len() as u64).sum())
            .unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<ContentHash, (Namespace, Vec<u8>)>>> {
        self.objects
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn insert(&self, namespace: Namespace, data: &[u8]) -> StoreResult<ContentHash> {
        let hash = content_hash(namespace, data);
        let mut objects = self.lock()?;
        objects
            .entry(hash.clone())
            .or_insert_with(|| (namespace, data.to_vec()));
        trace!(hash = %hash, len = data.len(), ?namespace, "Stored object");
        Ok(hash)
    }

    fn fetch(&self, namespace: Namespace, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        let objects = self.lock()?;
        match objects.get(hash) {
            Some((ns, data)) if *ns == namespace => Ok(data.clone()),
            _ => Err(StoreError::NotFound(hash.clone())),
        }
    }
}

impl ContentStore for MemoryStore {
    fn put(&self, data: &[u8]) -> StoreResult<ContentHash> {
        self.insert(Namespace::Blob, data)
    }

    fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        self.fetch(Namespace::Blob, hash)
    }

    fn dag_put(&self, data: &[u8]) -> StoreResult<ContentHash> {
        self.insert(Namespace::Node, data)
    }

    fn dag_get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        self.fetch(Namespace::Node, hash)
    }

    fn stat(&self, hash: &ContentHash) -> StoreResult<u64> {
        let objects = self.lock()?;
        objects
            .get(hash)
            .map(|(_, data)| data.len() as u64)
            .ok_or_else(|| StoreError::NotFound(hash.clone()))
    }
}
