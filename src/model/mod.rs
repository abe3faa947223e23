//! Canonical email record types, content hashes, and the chunk manifest.

pub mod address;
pub mod attachment;
pub mod email;
pub mod hash;
pub mod manifest;

pub use address::{Address, Addresses};
pub use attachment::{Attachment, EmbeddedFile};
pub use email::{Email, Header, HeaderField, Resent};
pub use hash::ContentHash;
pub use manifest::ChunkManifest;
