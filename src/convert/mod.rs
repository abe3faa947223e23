//! Raw message → canonical [`Email`], and whole-blob persistence.
//!
//! [`Converter`] owns the store handle, the chunk bound and the
//! cancellation token; the chunked engine ([`chunked`]) and the size
//! accountant ([`size`]) are further `impl` blocks on the same type.

pub mod chunked;
pub mod size;

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use chrono::DateTime;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::error::{EmlError, Result};
use crate::format;
use crate::model::{Attachment, ContentHash, Email, EmbeddedFile, Resent};
use crate::parser::mime::{self, BinaryPart};
use crate::store::ContentStore;

/// Default chunk bound: one GiB minus one KiB, just under the per-node
/// ceiling of common content-addressed stores.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = (1024 * 1024 * 1024) - 1024;

/// How a canonical record is laid out in the store.
///
/// Also selects how a root hash is interpreted when reading back or
/// measuring size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// One blob holding the whole serialized record.
    #[default]
    Whole,
    /// A manifest blob pointing at ordered chunk nodes.
    Chunked,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Whole => f.write_str("whole"),
            Encoding::Chunked => f.write_str("chunked"),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whole" => Ok(Encoding::Whole),
            "chunked" => Ok(Encoding::Chunked),
            other => Err(format!(
                "unknown encoding '{other}' (expected 'whole' or 'chunked')"
            )),
        }
    }
}

/// Converts raw messages into canonical records and moves them in and out
/// of a [`ContentStore`].
///
/// Every store call is synchronous and issued in a fixed order. Nothing is
/// retried and nothing already written is rolled back on failure.
#[derive(Debug)]
pub struct Converter<S> {
    store: S,
    max_chunk_size: usize,
    cancel: CancelToken,
}

impl<S: ContentStore> Converter<S> {
    /// Create a converter over `store` with the default chunk bound.
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            cancel: CancelToken::new(),
        }
    }

    /// Set the maximum chunk size used by [`Converter::put_email_chunked`].
    pub fn with_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    /// Attach a cancellation token checked before every store call.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Convert a raw RFC 5322 message into its canonical record.
    ///
    /// The whole message is parsed before anything is written, so a parse
    /// failure leaves the store untouched. Afterwards each attachment body,
    /// then each embedded-file body, is uploaded in message order and
    /// replaced by its hash. If an upload fails, bodies uploaded earlier in
    /// this call stay in the store.
    pub fn convert(&self, raw: &[u8]) -> Result<Email> {
        let parsed = mime::parse_message(raw)?;
        debug!(
            message_id = %parsed.message_id,
            attachments = parsed.attachments.len(),
            embedded = parsed.embedded_files.len(),
            "Parsed message"
        );

        let mut attachments = Vec::with_capacity(parsed.attachments.len());
        for BinaryPart {
            name,
            content_type,
            data,
        } in parsed.attachments
        {
            let data_hash = self.put(&data)?;
            attachments.push(Attachment {
                file_name: name,
                content_type,
                data_hash,
            });
        }

        let mut embedded_files = Vec::with_capacity(parsed.embedded_files.len());
        for BinaryPart {
            name,
            content_type,
            data,
        } in parsed.embedded_files
        {
            let data_hash = self.put(&data)?;
            embedded_files.push(EmbeddedFile {
                content_id: name,
                content_type,
                data_hash,
            });
        }

        let resent = parsed.resent.map(|r| Resent {
            addresses: r.addresses,
            resent_message_id: r.message_id,
            resent_date: r.date.unwrap_or(DateTime::UNIX_EPOCH),
        });

        Ok(Email {
            headers: parsed.headers,
            subject: parsed.subject,
            addresses: parsed.addresses,
            date: parsed.date.unwrap_or(DateTime::UNIX_EPOCH),
            message_id: parsed.message_id,
            in_reply_to: parsed.in_reply_to,
            references: parsed.references,
            text_body: parsed.text_body,
            html_body: parsed.html_body,
            attachments,
            embedded_files,
            resent,
        })
    }

    /// Read a message to the end and [`convert`](Self::convert) it.
    pub fn convert_reader(&self, mut reader: impl Read) -> Result<Email> {
        let mut raw = Vec::new();
        reader
            .read_to_end(&mut raw)
            .map_err(|e| EmlError::io("<reader>", e))?;
        self.convert(&raw)
    }

    /// Store a record as a single blob and return its hash.
    pub fn put_email(&self, email: &Email) -> Result<ContentHash> {
        let data = format::encode_email(email)?;
        let hash = self.put(&data)?;
        info!(hash = %hash, size = data.len(), "Stored email as whole blob");
        Ok(hash)
    }

    /// Fetch and decode a record stored with [`put_email`](Self::put_email).
    pub fn get_email(&self, hash: &ContentHash) -> Result<Email> {
        let data = self.get(hash)?;
        format::decode_email(&data)
    }

    /// Store a record with the chosen encoding.
    pub fn store_email(&self, email: &Email, encoding: Encoding) -> Result<ContentHash> {
        match encoding {
            Encoding::Whole => self.put_email(email),
            Encoding::Chunked => self.put_email_chunked(email),
        }
    }

    /// Fetch a record stored with the given encoding.
    pub fn load_email(&self, hash: &ContentHash, encoding: Encoding) -> Result<Email> {
        match encoding {
            Encoding::Whole => self.get_email(hash),
            Encoding::Chunked => self.get_email_chunked(hash),
        }
    }

    // ── Store calls ─────────────────────────────────────────────────

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            debug!("Cancellation requested; aborting before next store call");
            return Err(EmlError::Cancelled);
        }
        Ok(())
    }

    fn put(&self, data: &[u8]) -> Result<ContentHash> {
        self.checkpoint()?;
        let hash = self.store.put(data)?;
        debug!(hash = %hash, len = data.len(), "put");
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        self.checkpoint()?;
        debug!(hash = %hash, "get");
        Ok(self.store.get(hash)?)
    }

    fn dag_put(&self, data: &[u8]) -> Result<ContentHash> {
        self.checkpoint()?;
        let hash = self.store.dag_put(data)?;
        debug!(hash = %hash, len = data.len(), "dag put");
        Ok(hash)
    }

    fn dag_get(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        self.checkpoint()?;
        debug!(hash = %hash, "dag get");
        Ok(self.store.dag_get(hash)?)
    }

    fn stat(&self, hash: &ContentHash) -> Result<u64> {
        self.checkpoint()?;
        let size = self.store.stat(hash)?;
        debug!(hash = %hash, size, "stat");
        Ok(size)
    }
}
