//! `emldag`: canonical, content-addressed email records.
//!
//! This crate converts raw RFC 5322 messages into deterministic records
//! whose binary parts live in a content-addressed store, persists those
//! records whole or in bounded chunks, and measures the deduplicated
//! storage footprint of any set of stored records.

pub mod cancel;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod ingest;
pub mod model;
pub mod parser;
pub mod store;

pub use convert::{Converter, Encoding};
pub use error::{EmlError, Result, StoreError};
pub use model::{ContentHash, Email};
pub use store::{ContentStore, FsStore, MemoryStore};
