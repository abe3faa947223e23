//! Raw message parsing: header block decoding and MIME part extraction.

pub mod header;
pub mod mime;
