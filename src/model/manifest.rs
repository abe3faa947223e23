//! Index of the chunks that make up a record stored in chunked form.

use std::collections::BTreeMap;

use super::hash::ContentHash;
use crate::error::{EmlError, Result};

/// Ordered map from zero-based chunk index to the chunk's node hash.
///
/// Concatenating the chunk bytes in index order reproduces the serialized
/// record exactly. A `BTreeMap` keeps the encoded form ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChunkManifest {
    pub parts: BTreeMap<u32, ContentHash>,
}

impl ChunkManifest {
    /// Build a manifest from chunk hashes listed in index order.
    pub fn from_ordered(hashes: impl IntoIterator<Item = ContentHash>) -> Self {
        let parts = hashes
            .into_iter()
            .enumerate()
            .map(|(i, h)| (i as u32, h))
            .collect();
        Self { parts }
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// `true` for the manifest of an empty record.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Check that indices run `0..len` with no gaps.
    pub fn validate(&self) -> Result<()> {
        for (expected, index) in self.parts.keys().enumerate() {
            if *index as usize != expected {
                return Err(EmlError::InvalidManifest(format!(
                    "expected part {expected}, found part {index}"
                )));
            }
        }
        Ok(())
    }

    /// Chunk hashes in index order.
    pub fn ordered_hashes(&self) -> impl Iterator<Item = &ContentHash> {
        self.parts.values()
    }
}
