//! Content-addressed store on the local filesystem.
//!
//! ```text
//! <root>/
//!   blobs/<hash>   whole blobs (records, manifests, attachment bodies)
//!   nodes/<hash>   raw DAG nodes (record chunks)
//! ```

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::{content_hash, ContentStore, Namespace, StoreResult};
use crate::error::StoreError;
use crate::model::hash::ContentHash;

/// Directory-backed content store.
///
/// Writing bytes that are already present is a no-op, so identical
/// attachments across messages occupy disk space once.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        for ns in [Namespace::Blob, Namespace::Node] {
            let dir = root.join(ns.dir_name());
            std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        debug!(root = %root.display(), "Opened filesystem store");
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, namespace: Namespace, hash: &ContentHash) -> StoreResult<PathBuf> {
        // Hashes come from user input too; never let one escape the root.
        let valid = !hash.as_str().is_empty()
            && hash.as_str().chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(StoreError::NotFound(hash.clone()));
        }
        Ok(self.root.join(namespace.dir_name()).join(hash.as_str()))
    }

    fn write(&self, namespace: Namespace, data: &[u8]) -> StoreResult<ContentHash> {
        let hash = content_hash(namespace, data);
        let path = self.object_path(namespace, &hash)?;
        if path.exists() {
            trace!(hash = %hash, "Object already present");
            return Ok(hash);
        }

        // Readers only ever see complete objects: write aside, then rename.
        let tmp_path = path.with_extension(format!("tmp{}", std::process::id()));
        persist(&tmp_path, &path, data)?;

        trace!(hash = %hash, len = data.len(), ?namespace, "Wrote object");
        Ok(hash)
    }

    fn read(&self, namespace: Namespace, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        let path = self.object_path(namespace, hash)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(hash.clone())
            } else {
                StoreError::io(&path, e)
            }
        })
    }
}

/// Write `data` to `tmp_path` and move it to `path`.
///
/// On failure the temporary file is removed, so no `*.tmp<pid>` files are
/// left next to the objects.
fn persist(tmp_path: &Path, path: &Path, data: &[u8]) -> StoreResult<()> {
    let result = write_then_rename(tmp_path, path, data);
    if result.is_err() {
        // Best effort; the write error is what the caller needs.
        let _ = std::fs::remove_file(tmp_path);
    }
    result
}

fn write_then_rename(tmp_path: &Path, path: &Path, data: &[u8]) -> StoreResult<()> {
    let mut file = File::create(tmp_path).map_err(|e| StoreError::io(tmp_path, e))?;
    file.write_all(data)
        .and_then(|()| file.sync_all())
        .map_err(|e| StoreError::io(tmp_path, e))?;
    std::fs::rename(tmp_path, path).map_err(|e| StoreError::io(path, e))
}

impl ContentStore for FsStore {
    fn put(&self, data: &[u8]) -> StoreResult<ContentHash> {
        self.write(Namespace::Blob, data)
    }

    fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        self.read(Namespace::Blob, hash)
    }

    fn dag_put(&self, data: &[u8]) -> StoreResult<ContentHash> {
        self.write(Namespace::Node, data)
    }

    fn dag_get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        self.read(Namespace::Node, hash)
    }

    fn stat(&self, hash: &ContentHash) -> StoreResult<u64> {
        for ns in [Namespace::Blob, Namespace::Node] {
            let path = self.object_path(ns, hash)?;
            match std::fs::metadata(&path) {
                Ok(meta) => return Ok(meta.len()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        Err(StoreError::NotFound(hash.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        let blob = store.put(b"whole blob").unwrap();
        let node = store.dag_put(b"raw node").unwrap();

        assert_eq!(store.get(&blob).unwrap(), b"whole blob");
        assert_eq!(store.dag_get(&node).unwrap(), b"raw node");
        assert_eq!(store.stat(&blob).unwrap(), 10);
        assert_eq!(store.stat(&node).unwrap(), 8);
        assert!(dir.path().join("blobs").join(blob.as_str()).exists());
    }

    #[test]
    fn test_fs_store_dedups_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        let a = store.put(b"dup").unwrap();
        let b = store.put(b"dup").unwrap();
        assert_eq!(a, b);
        let count = std::fs::read_dir(dir.path().join("blobs")).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_fs_store_missing_and_hostile_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        let missing = ContentHash::new("abc123");
        assert!(matches!(store.get(&missing), Err(StoreError::NotFound(_))));
        let hostile = ContentHash::new("../../etc/passwd");
        assert!(matches!(store.get(&hostile), Err(StoreError::NotFound(_))));
        assert!(matches!(store.stat(&hostile), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let tmp_path = dir.path().join("abc.tmp1");
        let unreachable = dir.path().join("no-such-dir").join("abc");

        let err = persist(&tmp_path, &unreachable, b"payload").unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(!tmp_path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
