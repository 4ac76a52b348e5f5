//! Service startup, maintenance and shutdown

use crate::support::{description, ids, start};
use std::sync::Arc;
use tempfile::TempDir;
use termindex::{
    CommitFeed, CommitRecord, ComponentId, IndexError, IndexOutcome, IndexService, IndexValidity,
    JsonlComponentStore,
};

type Fixture = (IndexService, Arc<JsonlComponentStore>, Arc<CommitFeed>);

fn populated(temp_dir: &TempDir) -> Fixture {
    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = start(temp_dir.path(), &store, &feed);

    store.upsert(description(1, "Diabetes mellitus"));
    store.upsert(description(2, "Type 2 diabetes"));
    feed.publish(&CommitRecord::new(ids(&[1, 2])));
    (service, store, feed)
}

#[test]
fn test_shutdown_unsubscribes_and_closes_writer() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _store, feed) = populated(&temp_dir);
    assert_eq!(feed.listener_count(), 1);

    service.shutdown().unwrap();
    assert_eq!(feed.listener_count(), 0);
    assert!(!service.index().is_writer_open());

    // Second call is a no-op
    service.shutdown().unwrap();
}

#[test]
fn test_operations_after_shutdown_fail() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _store, _feed) = populated(&temp_dir);
    service.shutdown().unwrap();

    assert!(matches!(service.reindex(), Err(IndexError::ServiceShutDown)));
    assert!(matches!(service.commit_writer(), Err(IndexError::Storage { .. })));
    assert!(service.clear_index().is_err());

    // Reads keep working over the last visible generation
    assert_eq!(service.query("diabetes", 10).unwrap().len(), 2);
}

#[test]
fn test_pending_latches_released_at_shutdown() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _store, _feed) = populated(&temp_dir);

    let handle = service.await_indexing(ComponentId(99));
    service.shutdown().unwrap();
    assert_eq!(handle.wait(), IndexOutcome::NotIndexed);
}

#[test]
fn test_restart_keeps_documents() {
    let temp_dir = TempDir::new().unwrap();
    {
        let (service, _store, _feed) = populated(&temp_dir);
        service.shutdown().unwrap();
    }

    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = start(temp_dir.path(), &store, &feed);
    let stats = service.stats();
    assert_eq!(stats.validity, IndexValidity::Populated);
    assert!(!stats.reindex_required);
    assert_eq!(stats.documents, 2);
    assert_eq!(service.query("diabetes", 10).unwrap().len(), 2);
}

#[test]
fn test_invalidate_requires_reindex() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _store, _feed) = populated(&temp_dir);

    service.invalidate();
    let stats = service.stats();
    assert!(stats.reindex_required);
    assert_eq!(stats.validity, IndexValidity::Missing);

    let report = service.reindex().unwrap();
    assert_eq!(report.indexed, 2);
    let stats = service.stats();
    assert!(!stats.reindex_required);
    assert_eq!(stats.validity, IndexValidity::Populated);
}

#[test]
fn test_clear_keeps_validity() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _store, _feed) = populated(&temp_dir);
    let before = service.stats();

    let generation = service.clear_index().unwrap();
    let after = service.stats();
    assert_eq!(after.documents, 0);
    assert_eq!(after.validity, before.validity);
    assert_eq!(after.visible_generation, generation);
    assert!(service.query("diabetes", 10).unwrap().is_empty());
}

#[test]
fn test_force_merge_collapses_segments() {
    let temp_dir = TempDir::new().unwrap();
    let (service, store, feed) = populated(&temp_dir);
    store.upsert(description(3, "Gestational diabetes"));
    feed.publish(&CommitRecord::new(ids(&[3])));

    assert!(service.force_merge().unwrap());
    assert_eq!(service.index().index().searchable_segment_ids().unwrap().len(), 1);
    assert!(!service.force_merge().unwrap());
    assert_eq!(service.query("diabetes", 10).unwrap().len(), 3);
}

#[test]
fn test_disabled_service_skips_commits() {
    let temp_dir = TempDir::new().unwrap();
    let (service, store, feed) = populated(&temp_dir);

    service.set_enabled(false);
    assert!(!service.is_enabled());
    store.upsert(description(4, "Diabetes insipidus"));
    let handle = service.await_indexing(ComponentId(4));
    feed.publish(&CommitRecord::new(ids(&[4])));

    assert_eq!(handle.wait(), IndexOutcome::NotIndexed);
    assert_eq!(service.query("insipidus", 10).unwrap().len(), 0);
}
