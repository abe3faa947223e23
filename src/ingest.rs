//! Bulk conversion of a flat directory of `.eml` files.

use std::path::Path;

use tracing::{debug, info};

use crate::convert::{Converter, Encoding};
use crate::error::{EmlError, Result};
use crate::model::ContentHash;
use crate::store::ContentStore;

/// One converted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    /// File name within the directory.
    pub file_name: String,
    /// Root hash of the stored record.
    pub hash: ContentHash,
}

/// Convert and store every regular file directly inside `dir`.
///
/// Sub-directories are skipped, not descended into. Files are processed in
/// file-name order so repeated runs issue the same store calls. The first
/// file that fails to convert or store aborts the run; files stored before
/// it remain in the store.
///
/// `progress` is called with `(files done, total files)`.
pub fn add_from_directory<S: ContentStore>(
    converter: &Converter<S>,
    dir: &Path,
    encoding: Encoding,
    progress: Option<&dyn Fn(usize, usize)>,
) -> Result<Vec<Converted>> {
    let files = list_message_files(dir)?;
    let total = files.len();
    info!(dir = %dir.display(), files = total, %encoding, "Converting directory");

    let mut results = Vec::with_capacity(total);
    for (i, file_name) in files.into_iter().enumerate() {
        if let Some(cb) = progress {
            cb(i, total);
        }
        let path = dir.join(&file_name);
        let raw = std::fs::read(&path).map_err(|e| EmlError::io(&path, e))?;
        let email = converter.convert(&raw)?;
        let hash = converter.store_email(&email, encoding)?;
        debug!(file = %file_name, hash = %hash, "Converted file");
        results.push(Converted { file_name, hash });
    }
    if let Some(cb) = progress {
        cb(total, total);
    }

    Ok(results)
}

/// Names of the regular files directly inside `dir`, sorted.
pub fn list_message_files(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| EmlError::io(dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EmlError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| EmlError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
