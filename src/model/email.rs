//! The canonical email record.
//!
//! An [`Email`] is built once by the converter and never mutated afterwards.
//! Field order in every struct here is the wire order of the stored record:
//! new fields may only be appended, and the format version in
//! [`crate::format`] must be bumped when that happens.

use chrono::{DateTime, Utc};

use super::address::Addresses;
use super::attachment::{Attachment, EmbeddedFile};
use super::hash::ContentHash;

/// One header name with every value it carried, in message order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HeaderField {
    /// Canonical name (`Content-Type`, `Message-Id`, ...).
    pub name: String,
    pub values: Vec<String>,
}

/// All message headers as an ordered association list.
///
/// Order is first-seen order from the raw message. A repeated header
/// (`Received`, for instance) appends to the values of its first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Header {
    pub fields: Vec<HeaderField>,
}

impl Header {
    /// Record a header value, grouping it under the first field of the same name.
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        let name = canonical_header_name(name);
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.values.push(value.into()),
            None => self.fields.push(HeaderField {
                name,
                values: vec![value.into()],
            }),
        }
    }

    /// All values for a header (case-insensitive name lookup).
    pub fn get_all(&self, name: &str) -> &[String] {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.values.as_slice())
            .unwrap_or(&[])
    }

    /// First value for a header (case-insensitive name lookup).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Canonicalize a header name: first letter and every letter after a `-`
/// upper-cased, the rest lower-cased (`content-TYPE` → `Content-Type`).
pub fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for ch in name.trim().chars() {
        if upper {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
        upper = ch == '-';
    }
    out
}

/// The `Resent-*` block of a re-sent message.
///
/// Only present when at least one resent address list is non-empty; a
/// message without resent headers has `Email::resent == None`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Resent {
    /// `Resent-Sender/From/To/Cc/Bcc`. `reply_to` is always empty here.
    pub addresses: Addresses,
    pub resent_message_id: String,
    pub resent_date: DateTime<Utc>,
}

/// Canonical, content-addressable email record.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Email {
    pub headers: Header,
    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub subject: String,
    pub addresses: Addresses,
    /// `Date:` header normalized to UTC; Unix epoch when missing.
    pub date: DateTime<Utc>,
    pub message_id: String,
    pub in_reply_to: Vec<String>,
    pub references: Vec<String>,
    pub text_body: String,
    pub html_body: String,
    /// In the order the parts appear in the message.
    pub attachments: Vec<Attachment>,
    /// In the order the parts appear in the message.
    pub embedded_files: Vec<EmbeddedFile>,
    pub resent: Option<Resent>,
}

impl Email {
    /// Hashes of every externalized body: attachments first, then embedded files.
    pub fn data_hashes(&self) -> impl Iterator<Item = &ContentHash> {
        self.attachments
            .iter()
            .map(|a| &a.data_hash)
            .chain(self.embedded_files.iter().map(|e| &e.data_hash))
    }
}
