//! Bulk loads bypass the per-commit pipeline

use crate::support::{description, start};
use std::sync::Arc;
use tempfile::TempDir;
use termindex::{CommitFeed, CommitRecord, ComponentId, JsonlComponentStore};

const RECORDS: u64 = 1000;

#[test]
fn test_bulk_commits_are_ignored_until_reindex() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = start(temp_dir.path(), &store, &feed);

    for id in 1..=RECORDS {
        store.upsert(description(id, &format!("Imported concept {id}")));
        feed.publish(&CommitRecord::bulk([ComponentId(id)]));
    }

    let stats = service.stats();
    assert_eq!(stats.jobs_submitted, 0);
    assert_eq!(stats.documents, 0);

    let report = service.reindex().unwrap();
    assert_eq!(report.jobs, RECORDS as usize);
    assert_eq!(report.indexed, RECORDS as usize);
    assert!(!report.has_failures());
    assert!(report.generation.is_some());

    let stats = service.stats();
    assert_eq!(stats.documents, RECORDS);
    assert_eq!(stats.visible_generation, report.generation.unwrap());

    let results = service.query("imported", 5).unwrap();
    assert_eq!(results.len(), 5);
}

#[test]
fn test_reindex_replaces_previous_documents() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = start(temp_dir.path(), &store, &feed);

    store.upsert(description(1, "Asthma"));
    feed.publish(&CommitRecord::new([ComponentId(1)]));
    store.upsert(description(1, "Bronchial asthma"));
    feed.publish(&CommitRecord::new([ComponentId(1)]));
    assert_eq!(service.stats().documents, 2);

    service.reindex().unwrap();
    assert_eq!(service.stats().documents, 1);
    assert_eq!(service.query("asthma", 10).unwrap().len(), 1);
}
