//! Integration tests for directory ingestion into a filesystem store.

use std::cell::RefCell;
use std::path::Path;

use assert_fs::prelude::*;
use predicates::prelude::*;

use emldag::ingest::add_from_directory;
use emldag::{Converter, EmlError, Encoding, FsStore};

fn fixture_text(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn test_add_from_directory_converts_flat_files() {
    let inbox = assert_fs::TempDir::new().unwrap();
    inbox.child("2.eml").write_str(&fixture_text("shared_b.eml")).unwrap();
    inbox.child("1.eml").write_str(&fixture_text("shared_a.eml")).unwrap();
    inbox
        .child("nested/3.eml")
        .write_str(&fixture_text("plain.eml"))
        .unwrap();

    let store_dir = assert_fs::TempDir::new().unwrap();
    let converter = Converter::new(FsStore::open(store_dir.path()).unwrap());

    let calls = RefCell::new(Vec::new());
    let results = add_from_directory(
        &converter,
        inbox.path(),
        Encoding::Whole,
        Some(&|done, total| calls.borrow_mut().push((done, total))),
    )
    .unwrap();

    let names: Vec<&str> = results.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(names, ["1.eml", "2.eml"]);
    assert_eq!(calls.into_inner(), vec![(0, 2), (1, 2), (2, 2)]);

    for converted in &results {
        store_dir
            .child("blobs")
            .child(converted.hash.as_str())
            .assert(predicate::path::is_file());
        let email = converter.get_email(&converted.hash).unwrap();
        assert_eq!(email.attachments[0].file_name, "data.csv");
    }
}

#[test]
fn test_add_from_directory_chunked_writes_nodes() {
    let inbox = assert_fs::TempDir::new().unwrap();
    inbox.child("m.eml").write_str(&fixture_text("multipart.eml")).unwrap();

    let store_dir = assert_fs::TempDir::new().unwrap();
    let converter = Converter::new(FsStore::open(store_dir.path()).unwrap()).with_chunk_size(100);

    let results = add_from_directory(&converter, inbox.path(), Encoding::Chunked, None).unwrap();
    assert_eq!(results.len(), 1);

    let manifest = converter.get_chunk_manifest(&results[0].hash).unwrap();
    assert!(manifest.len() > 1);
    for part in manifest.ordered_hashes() {
        store_dir
            .child("nodes")
            .child(part.as_str())
            .assert(predicate::path::exists());
    }
}

#[test]
fn test_add_from_directory_stops_at_first_bad_file() {
    let inbox = assert_fs::TempDir::new().unwrap();
    inbox.child("a.eml").write_str(&fixture_text("shared_a.eml")).unwrap();
    inbox.child("b.eml").write_str("not a message\n").unwrap();
    inbox.child("c.eml").write_str(&fixture_text("plain.eml")).unwrap();

    let store_dir = assert_fs::TempDir::new().unwrap();
    let converter = Converter::new(FsStore::open(store_dir.path()).unwrap());

    let err = add_from_directory(&converter, inbox.path(), Encoding::Whole, None).unwrap_err();
    assert!(matches!(err, EmlError::Parse(_)));

    // a.eml was fully stored before the failure and stays put.
    let blobs = std::fs::read_dir(store_dir.child("blobs").path()).unwrap().count();
    assert_eq!(blobs, 2);
}

#[test]
fn test_add_from_empty_directory() {
    let inbox = assert_fs::TempDir::new().unwrap();
    let store_dir = assert_fs::TempDir::new().unwrap();
    let converter = Converter::new(FsStore::open(store_dir.path()).unwrap());

    let results = add_from_directory(&converter, inbox.path(), Encoding::Whole, None).unwrap();
    assert!(results.is_empty());
    store_dir.child("blobs").assert(predicate::path::is_dir());
}
