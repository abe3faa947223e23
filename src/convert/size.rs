//! Deduplicated storage footprint of a set of stored records.

use std::collections::HashSet;

use tracing::info;

use super::{Converter, Encoding};
use crate::error::{EmlError, Result};
use crate::model::ContentHash;
use crate::store::ContentStore;

impl<S: ContentStore> Converter<S> {
    /// Every hash a set of roots occupies in the store, each listed once.
    ///
    /// The roots come first (in the given order, duplicates dropped),
    /// followed by the hashes discovered under them: for each root its
    /// chunk nodes (chunked mode only), then its attachment bodies, then
    /// its embedded-file bodies.
    pub fn discover_hashes(&self, mode: Encoding, roots: &[ContentHash]) -> Result<Vec<ContentHash>> {
        if roots.is_empty() {
            return Err(EmlError::NoRootsProvided);
        }

        let mut seen: HashSet<ContentHash> = HashSet::new();
        let mut unique: Vec<ContentHash> = Vec::new();
        let mut record = |hash: &ContentHash| {
            if seen.insert(hash.clone()) {
                unique.push(hash.clone());
            }
        };

        for root in roots {
            record(root);
        }

        let mut visited: HashSet<&ContentHash> = HashSet::new();
        for root in roots {
            if !visited.insert(root) {
                continue;
            }
            let email = match mode {
                Encoding::Whole => self.get_email(root)?,
                Encoding::Chunked => {
                    let manifest = self.get_chunk_manifest(root)?;
                    for part in manifest.ordered_hashes() {
                        record(part);
                    }
                    self.assemble(&manifest)?
                }
            };
            for data_hash in email.data_hashes() {
                record(data_hash);
            }
        }

        Ok(unique)
    }

    /// Total storage size of a set of records, counting each hash once.
    ///
    /// An attachment shared by several records, or a root listed twice,
    /// contributes its size a single time. Any store error aborts the
    /// whole calculation; an empty `roots` fails with
    /// [`EmlError::NoRootsProvided`] before any store call.
    pub fn calculate_size(&self, mode: Encoding, roots: &[ContentHash]) -> Result<u64> {
        self.calculate_size_detailed(mode, roots).map(|(_, total)| total)
    }

    /// Like [`calculate_size`](Self::calculate_size), also returning the
    /// unique hashes that were counted. Each root is fetched once.
    pub fn calculate_size_detailed(
        &self,
        mode: Encoding,
        roots: &[ContentHash],
    ) -> Result<(Vec<ContentHash>, u64)> {
        let hashes = self.discover_hashes(mode, roots)?;

        let mut total: u64 = 0;
        for hash in &hashes {
            total += self.stat(hash)?;
        }

        info!(
            %mode,
            roots = roots.len(),
            unique_hashes = hashes.len(),
            size = total,
            "Calculated deduplicated size"
        );
        Ok((hashes, total))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryStore, StoreResult};

    /// Wraps a store, counting calls and optionally failing `stat`.
    #[derive(Default)]
    struct ProbeStore {
        inner: MemoryStore,
        calls: Cell<usize>,
        reads: Cell<usize>,
        fail_stat: bool,
    }

    impl ContentStore for ProbeStore {
        fn put(&self, data: &[u8]) -> StoreResult<ContentHash> {
            self.calls.set(self.calls.get() + 1);
            self.inner.put(data)
        }
        fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            self.reads.set(self.reads.get() + 1);
            self.inner.get(hash)
        }
        fn dag_put(&self, data: &[u8]) -> StoreResult<ContentHash> {
            self.calls.set(self.calls.get() + 1);
            self.inner.dag_put(data)
        }
        fn dag_get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            self.reads.set(self.reads.get() + 1);
            self.inner.dag_get(hash)
        }
        fn stat(&self, hash: &ContentHash) -> StoreResult<u64> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_stat {
                return Err(StoreError::Backend("stat unavailable".into()));
            }
            self.inner.stat(hash)
        }
    }

    fn message(id: &str, attachment_body: &str) -> Vec<u8> {
        format!(
            "From: a@example.com\r\n\
Subject: {id}\r\n\
Message-ID: <{id}@example.com>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"b\"\r\n\
\r\n\
--b\r\n\
Content-Type: text/plain\r\n\
\r\n\
body of {id}\r\n\
--b\r\n\
Content-Type: text/csv\r\n\
Content-Disposition: attachment; filename=\"data.csv\"\r\n\
\r\n\
{attachment_body}\r\n\
--b--\r\n"
        )
        .into_bytes()
    }

    #[test]
    fn test_empty_roots_makes_no_store_calls() {
        let converter = Converter::new(ProbeStore::default());
        for mode in [Encoding::Whole, Encoding::Chunked] {
            assert!(matches!(
                converter.calculate_size(mode, &[]),
                Err(EmlError::NoRootsProvided)
            ));
        }
        assert_eq!(converter.store().calls.get(), 0);
    }

    #[test]
    fn test_shared_attachment_counted_once() {
        let converter = Converter::new(MemoryStore::new());
        let e1 = converter.convert(&message("one", "a,b,c")).unwrap();
        let e2 = converter.convert(&message("two", "a,b,c")).unwrap();
        assert_eq!(e1.attachments[0].data_hash, e2.attachments[0].data_hash);

        let h1 = converter.put_email(&e1).unwrap();
        let h2 = converter.put_email(&e2).unwrap();

        let s1 = converter.calculate_size(Encoding::Whole, &[h1.clone()]).unwrap();
        let s2 = converter.calculate_size(Encoding::Whole, &[h2.clone()]).unwrap();
        let both = converter
            .calculate_size(Encoding::Whole, &[h1.clone(), h2.clone()])
            .unwrap();
        let shared = converter.store().stat(&e1.attachments[0].data_hash).unwrap();

        assert!(both < s1 + s2);
        assert_eq!(both, s1 + s2 - shared);
        // Everything the store holds is referenced by one of the two roots.
        assert_eq!(both, converter.store().total_bytes());
    }

    #[test]
    fn test_disjoint_roots_add_up() {
        let converter = Converter::new(MemoryStore::new());
        let h1 = converter
            .put_email(&converter.convert(&message("one", "1,2")).unwrap())
            .unwrap();
        let h2 = converter
            .put_email(&converter.convert(&message("two", "3,4")).unwrap())
            .unwrap();

        let s1 = converter.calculate_size(Encoding::Whole, &[h1.clone()]).unwrap();
        let s2 = converter.calculate_size(Encoding::Whole, &[h2.clone()]).unwrap();
        let both = converter.calculate_size(Encoding::Whole, &[h1, h2]).unwrap();
        assert_eq!(both, s1 + s2);
    }

    #[test]
    fn test_repeated_root_counted_once() {
        let converter = Converter::new(MemoryStore::new());
        let h = converter
            .put_email(&converter.convert(&message("one", "x")).unwrap())
            .unwrap();
        let single = converter.calculate_size(Encoding::Whole, &[h.clone()]).unwrap();
        let twice = converter
            .calculate_size(Encoding::Whole, &[h.clone(), h])
            .unwrap();
        assert_eq!(single, twice);
    }

    #[test]
    fn test_chunked_mode_counts_manifest_and_parts() {
        let converter = Converter::new(MemoryStore::new()).with_chunk_size(64);
        let email = converter.convert(&message("one", "p,q,r")).unwrap();
        let root = converter.put_email_chunked(&email).unwrap();
        let manifest = converter.get_chunk_manifest(&root).unwrap();

        let hashes = converter
            .discover_hashes(Encoding::Chunked, &[root.clone()])
            .unwrap();
        assert_eq!(hashes[0], root);
        assert_eq!(hashes.len(), 1 + manifest.len() + 1);
        for part in manifest.ordered_hashes() {
            assert!(hashes.contains(part));
        }

        let size = converter.calculate_size(Encoding::Chunked, &[root]).unwrap();
        assert_eq!(size, converter.store().total_bytes());
    }

    #[test]
    fn test_stat_failure_aborts() {
        let store = ProbeStore {
            fail_stat: true,
            ..Default::default()
        };
        let converter = Converter::new(store);
        let h = converter
            .put_email(&converter.convert(&message("one", "x")).unwrap())
            .unwrap();
        assert!(matches!(
            converter.calculate_size(Encoding::Whole, &[h]),
            Err(EmlError::Store(StoreError::Backend(_)))
        ));
    }

    #[test]
    fn test_unknown_root_aborts() {
        let converter = Converter::new(MemoryStore::new());
        let err = converter
            .calculate_size(Encoding::Whole, &[ContentHash::new("nope")])
            .unwrap_err();
        assert!(matches!(err, EmlError::Store(StoreError::NotFound(_))));
    }

    #[test]
    fn test_detailed_size_reads_each_root_once() {
        let converter = Converter::new(ProbeStore::default()).with_chunk_size(64);
        let email = converter.convert(&message("one", "a,b,c")).unwrap();
        let root = converter.put_email_chunked(&email).unwrap();
        let parts = converter.get_chunk_manifest(&root).unwrap().len();

        converter.store().reads.set(0);
        let (hashes, total) = converter
            .calculate_size_detailed(Encoding::Chunked, &[root.clone()])
            .unwrap();
        // One manifest read plus one read per chunk.
        assert_eq!(converter.store().reads.get(), 1 + parts);
        assert_eq!(hashes.len(), 1 + parts + 1);
        assert_eq!(
            total,
            converter.calculate_size(Encoding::Chunked, &[root]).unwrap()
        );
    }
}
