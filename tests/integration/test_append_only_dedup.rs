//! Re-indexed components add documents; queries collapse them

use crate::support::{description, ids, start};
use std::sync::Arc;
use tempfile::TempDir;
use termindex::{
    CommitFeed, CommitRecord, ComponentId, GenerationTarget, JsonlComponentStore, SearchQuery,
};

#[test]
fn test_new_version_is_searchable_and_never_duplicated() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = start(temp_dir.path(), &store, &feed);

    store.upsert(description(42, "Fracture of femur"));
    feed.publish(&CommitRecord::new(ids(&[42])));

    store.upsert(description(42, "Fracture of femur (disorder)"));
    feed.publish(&CommitRecord::new(ids(&[42])));

    // Both versions stay in the index
    assert_eq!(service.index().document_count(), 2);

    let latest = service
        .search(&SearchQuery::parsed("disorder").at_generation(GenerationTarget::Latest))
        .unwrap();
    assert_eq!(latest.component_ids(), vec![ComponentId(42)]);

    let both = service.query("fracture femur", 10).unwrap();
    assert_eq!(both.component_ids(), vec![ComponentId(42)]);
}

#[test]
fn test_size_limit_one_returns_best_version_once() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = start(temp_dir.path(), &store, &feed);

    store.upsert(description(42, "tortoise"));
    feed.publish(&CommitRecord::new(ids(&[42])));
    store.upsert(description(42, "tortoise tortoise tortoise"));
    feed.publish(&CommitRecord::new(ids(&[42])));
    store.upsert(description(43, "tortoise shell"));
    feed.publish(&CommitRecord::new(ids(&[43])));

    let results = service.query("tortoise", 1).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results.hits[0].component_id, ComponentId(42));

    let all = service.query("tortoise", 10).unwrap();
    assert_eq!(all.component_ids(), vec![ComponentId(42), ComponentId(43)]);
    assert!(all.hits[0].score >= all.hits[1].score);
}

#[test]
fn test_page_never_repeats_component() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = start(temp_dir.path(), &store, &feed);

    for id in 1..=6u64 {
        store.upsert(description(id, "renal calculus"));
    }
    feed.publish(&CommitRecord::new(ids(&[1, 2, 3, 4, 5, 6])));
    // Second versions of the same six records
    feed.publish(&CommitRecord::new(ids(&[1, 2, 3, 4, 5, 6])));

    let results = service.query("calculus", 4).unwrap();
    let found = results.component_ids();
    assert!(!found.is_empty() && found.len() <= 4);

    let mut unique = found.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), found.len());
}
