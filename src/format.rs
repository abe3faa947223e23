//! Stored record format.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ magic: [u8; 4]                       │
//! │   b"EMLR" (Email) / b"EMLM" (manifest)│
//! │ version: u16 (little-endian)         │
//! ├──────────────────────────────────────┤
//! │ bincode-serialized record            │
//! └──────────────────────────────────────┘
//! ```
//!
//! bincode is positional, so struct field order *is* the field identity:
//! fields are only ever appended, never reordered or given a new meaning,
//! and any change bumps [`VERSION`]. The same logical record always
//! encodes to the same bytes, which is what makes its store hash stable.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{EmlError, Result};
use crate::model::{ChunkManifest, Email};

/// Magic bytes of a stored [`Email`].
pub const EMAIL_MAGIC: &[u8; 4] = b"EMLR";

/// Magic bytes of a stored [`ChunkManifest`].
pub const MANIFEST_MAGIC: &[u8; 4] = b"EMLM";

/// Current record format version.
pub const VERSION: u16 = 1;

/// Magic plus version.
pub const HEADER_SIZE: usize = 6;

/// Encode an email record.
pub fn encode_email(email: &Email) -> Result<Vec<u8>> {
    encode(EMAIL_MAGIC, email)
}

/// Decode an email record.
pub fn decode_email(data: &[u8]) -> Result<Email> {
    decode(EMAIL_MAGIC, data)
}

/// Encode a chunk manifest.
pub fn encode_manifest(manifest: &ChunkManifest) -> Result<Vec<u8>> {
    encode(MANIFEST_MAGIC, manifest)
}

/// Decode a chunk manifest and check its indices are contiguous.
pub fn decode_manifest(data: &[u8]) -> Result<ChunkManifest> {
    let manifest: ChunkManifest = decode(MANIFEST_MAGIC, data)?;
    manifest.validate()?;
    Ok(manifest)
}

fn encode<T: Serialize>(magic: &[u8; 4], record: &T) -> Result<Vec<u8>> {
    let body = bincode::serialize(record)?;
    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(magic);
    out.write_u16::<LittleEndian>(VERSION)
        .map_err(|e| EmlError::Codec(e.to_string()))?;
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode<T: DeserializeOwned>(magic: &[u8; 4], data: &[u8]) -> Result<T> {
    if data.len() < HEADER_SIZE {
        return Err(EmlError::Codec(format!(
            "record too short: {} bytes",
            data.len()
        )));
    }
    if &data[..4] != magic {
        return Err(EmlError::Codec(format!(
            "invalid magic bytes: expected {:?}, found {:?}",
            String::from_utf8_lossy(magic),
            String::from_utf8_lossy(&data[..4])
        )));
    }
    let version = Cursor::new(&data[4..HEADER_SIZE])
        .read_u16::<LittleEndian>()
        .map_err(|e| EmlError::Codec(e.to_string()))?;
    if version != VERSION {
        return Err(EmlError::Codec(format!(
            "incompatible version: expected {VERSION}, found {version}"
        )));
    }
    Ok(bincode::deserialize(&data[HEADER_SIZE..])?)
}
