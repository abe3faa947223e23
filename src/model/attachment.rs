//! Binary parts of a message, externalized to the content store.
//!
//! Body bytes are never kept inline. The codec uploads each part as it is
//! parsed and records only the returned hash.

use super::hash::ContentHash;

/// A regular attachment (`Content-Disposition: attachment`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    /// Filename from the MIME headers (may be empty).
    pub file_name: String,
    /// MIME content type, e.g. `"application/pdf"`.
    pub content_type: String,
    /// Hash of the decoded body as stored.
    pub data_hash: ContentHash,
}

/// An inline part referenced from the HTML body via `cid:`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EmbeddedFile {
    /// `Content-ID` without angle brackets.
    pub content_id: String,
    /// MIME content type, e.g. `"image/png"`.
    pub content_type: String,
    /// Hash of the decoded body as stored.
    pub data_hash: ContentHash,
}
