//! A writer that waits for its own generation sees its own write

use crate::support::{description, ids, start};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use termindex::{
    CommitFeed, CommitRecord, ComponentId, GenerationTarget, IndexOutcome, JsonlComponentStore,
    SearchError, SearchQuery,
};

#[test]
fn test_query_at_latch_generation_sees_write() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = start(temp_dir.path(), &store, &feed);

    store.upsert(description(42, "Fracture of femur"));
    let handle = service.await_indexing(ComponentId(42));

    let committer = {
        let feed = Arc::clone(&feed);
        thread::spawn(move || feed.publish(&CommitRecord::new(ids(&[42]))))
    };

    let generation = handle
        .wait_timeout(Duration::from_secs(10))
        .and_then(|outcome| outcome.generation())
        .expect("record should be indexed");

    let results = service
        .search(&SearchQuery::parsed("femur").at_generation(GenerationTarget::At(generation)))
        .unwrap();
    assert!(results.target_reached);
    assert!(results.generation >= generation);
    assert!(results.contains(ComponentId(42)));

    assert_eq!(committer.join().unwrap(), 1);
}

#[test]
fn test_concurrent_writers_each_see_their_record() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = Arc::new(start(temp_dir.path(), &store, &feed));

    let writers: Vec<_> = (0..4u64)
        .map(|n| {
            let store = Arc::clone(&store);
            let feed = Arc::clone(&feed);
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let id = 100 + n;
                let term = format!("marker{n}");
                store.upsert(description(id, &format!("Lesion {term}")));

                let handle = service.await_indexing(ComponentId(id));
                feed.publish(&CommitRecord::new(ids(&[id])));
                let generation = handle.wait().generation().unwrap();

                let results = service
                    .search(
                        &SearchQuery::parsed(term)
                            .at_generation(GenerationTarget::At(generation))
                            .with_wait_timeout(Duration::from_secs(10)),
                    )
                    .unwrap();
                assert!(results.target_reached);
                assert_eq!(results.component_ids(), vec![ComponentId(id)]);
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    assert_eq!(service.stats().records_indexed, 4);
}

#[test]
fn test_disabled_indexing_resolves_not_indexed() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = start(temp_dir.path(), &store, &feed);

    service.set_enabled(false);
    store.upsert(description(7, "Otitis media"));
    let handle = service.await_indexing(ComponentId(7));
    feed.publish(&CommitRecord::new(ids(&[7])));

    assert_eq!(handle.wait(), IndexOutcome::NotIndexed);
    assert!(service.query("otitis", 10).unwrap().is_empty());
}

#[test]
fn test_waiting_for_unassigned_generation_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = start(temp_dir.path(), &store, &feed);

    let beyond = service.index().last_assigned() + 1_000;
    let err = service
        .search(&SearchQuery::parsed("anything").at_generation(GenerationTarget::At(beyond)))
        .unwrap_err();
    assert!(matches!(err, SearchError::UnknownGeneration { .. }));
}
