//! Startup over index directories this build cannot read

use crate::support::{description, ids, settings, start};
use std::sync::Arc;
use tempfile::TempDir;
use termindex::{
    CommitFeed, CommitRecord, ComponentId, DocumentIndex, IndexValidity, JsonlComponentStore,
};

const HEAP: usize = 15_000_000;

#[test]
fn test_unreadable_files_are_wiped() {
    let temp_dir = TempDir::new().unwrap();
    let index_dir = settings(temp_dir.path()).index.directory();
    std::fs::create_dir_all(&index_dir).unwrap();
    std::fs::write(index_dir.join("segments_1"), b"not a tantivy segment").unwrap();

    let index = DocumentIndex::open(&index_dir, HEAP).unwrap();
    let status = index.status();
    assert_eq!(status.validity, IndexValidity::FormatIncompatible);
    assert!(status.reindex_required);
    assert!(!index_dir.join("segments_1").exists());
    assert_eq!(index.document_count(), 0);
}

#[test]
fn test_garbage_meta_file_is_format_incompatible() {
    let temp_dir = TempDir::new().unwrap();
    let index_dir = settings(temp_dir.path()).index.directory();
    std::fs::create_dir_all(&index_dir).unwrap();
    std::fs::write(index_dir.join("meta.json"), b"{ this is not json").unwrap();

    let index = DocumentIndex::open(&index_dir, HEAP).unwrap();
    assert_eq!(index.status().validity, IndexValidity::FormatIncompatible);
    assert!(index.status().reindex_required);
}

#[test]
fn test_service_rebuilds_before_ready() {
    let temp_dir = TempDir::new().unwrap();
    let index_dir = settings(temp_dir.path()).index.directory();
    std::fs::create_dir_all(&index_dir).unwrap();
    std::fs::write(index_dir.join("segments_1"), b"left over from an older release").unwrap();

    let store = Arc::new(JsonlComponentStore::new());
    store.upsert(description(1, "Myocardial infarction"));
    store.upsert(description(2, "Heart attack"));
    let feed = Arc::new(CommitFeed::new());

    let service = start(temp_dir.path(), &store, &feed);
    let stats = service.stats();
    assert!(!stats.reindex_required);
    assert_eq!(stats.validity, IndexValidity::Populated);
    assert_eq!(stats.documents, 2);

    let results = service.query("heart", 10).unwrap();
    assert_eq!(results.component_ids(), vec![ComponentId(2)]);

    // Writes after recovery go through the normal pipeline
    store.upsert(description(3, "Heart failure"));
    feed.publish(&CommitRecord::new(ids(&[3])));
    assert_eq!(service.query("heart", 10).unwrap().len(), 2);
}

#[test]
fn test_fresh_directory_does_not_reindex() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlComponentStore::new());
    store.upsert(description(1, "Fracture of femur"));
    let feed = Arc::new(CommitFeed::new());

    let service = start(temp_dir.path(), &store, &feed);
    let stats = service.stats();
    assert_eq!(stats.validity, IndexValidity::Missing);
    assert!(!stats.reindex_required);
    assert_eq!(stats.documents, 0);
    assert_eq!(stats.jobs_submitted, 0);
}
