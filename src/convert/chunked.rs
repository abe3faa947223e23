//! Chunked record storage.
//!
//! A serialized record is cut into consecutive pieces of at most
//! `max_chunk_size` bytes, each stored as a raw DAG node. A
//! [`ChunkManifest`] mapping index → node hash is then stored as a blob,
//! and its hash stands for the record. Reading concatenates the nodes in
//! index order; there is no checksum beyond the content hashes themselves.

use tracing::{debug, info};

use super::Converter;
use crate::error::{EmlError, Result};
use crate::format;
use crate::model::{ChunkManifest, ContentHash, Email};
use crate::store::ContentStore;

/// Split `data` into consecutive slices of at most `bound` bytes.
///
/// Splitting stops when the running offset reaches the end, so a length
/// that is an exact multiple of `bound` never yields an empty trailing
/// chunk. A zero bound cannot make progress and is rejected.
pub fn split_chunks(data: &[u8], bound: usize) -> Result<Vec<&[u8]>> {
    if bound == 0 {
        return Err(EmlError::ChunkOverflow {
            bound,
            total: data.len(),
        });
    }

    let mut chunks = Vec::with_capacity(data.len().div_ceil(bound));
    let mut offset = 0;
    while offset < data.len() {
        let end = offset.saturating_add(bound).min(data.len());
        chunks.push(&data[offset..end]);
        offset = end;
    }
    Ok(chunks)
}

impl<S: ContentStore> Converter<S> {
    /// Store a record in chunked form and return the manifest hash.
    ///
    /// Always chunks, whatever the record size; choosing between whole and
    /// chunked storage is up to the caller. Chunks are uploaded strictly in
    /// index order.
    pub fn put_email_chunked(&self, email: &Email) -> Result<ContentHash> {
        let data = format::encode_email(email)?;
        let chunks = split_chunks(&data, self.max_chunk_size)?;
        if chunks.len() > u32::MAX as usize {
            return Err(EmlError::ChunkOverflow {
                bound: self.max_chunk_size,
                total: data.len(),
            });
        }

        let mut hashes = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let hash = self.dag_put(chunk)?;
            debug!(index, len = chunk.len(), hash = %hash, "Stored chunk");
            hashes.push(hash);
        }

        let manifest = ChunkManifest::from_ordered(hashes);
        let manifest_bytes = format::encode_manifest(&manifest)?;
        let hash = self.put(&manifest_bytes)?;
        info!(
            hash = %hash,
            size = data.len(),
            parts = manifest.len(),
            "Stored email as chunks"
        );
        Ok(hash)
    }

    /// Fetch the manifest of a chunked record.
    pub fn get_chunk_manifest(&self, hash: &ContentHash) -> Result<ChunkManifest> {
        let data = self.get(hash)?;
        format::decode_manifest(&data)
    }

    /// Fetch and reassemble a record stored with
    /// [`put_email_chunked`](Self::put_email_chunked).
    pub fn get_email_chunked(&self, hash: &ContentHash) -> Result<Email> {
        let manifest = self.get_chunk_manifest(hash)?;
        self.assemble(&manifest)
    }

    /// Concatenate a manifest's chunks in index order and decode the record.
    pub(super) fn assemble(&self, manifest: &ChunkManifest) -> Result<Email> {
        let mut data = Vec::new();
        for chunk_hash in manifest.ordered_hashes() {
            data.extend_from_slice(&self.dag_get(chunk_hash)?);
        }
        format::decode_email(&data)
    }
}
