//! Type-ahead and restricted queries

use crate::support::{METADATA_MODULE, description, description_in, ids, semantic, start};
use std::sync::Arc;
use tempfile::TempDir;
use termindex::{
    CommitFeed, CommitRecord, ComponentId, IndexService, JsonlComponentStore, SearchError,
    SearchQuery,
};

fn corpus(temp_dir: &TempDir) -> (IndexService, Arc<CommitFeed>) {
    let store = Arc::new(JsonlComponentStore::new());
    let feed = Arc::new(CommitFeed::new());
    let service = start(temp_dir.path(), &store, &feed);

    store.upsert(description(1, "Testudinidae family"));
    store.upsert(description(2, "Family history of diabetes"));
    store.upsert(semantic(3, 900, "family testing protocol"));
    store.upsert(semantic(4, 901, "family tests"));
    store.upsert(description_in(5, "Family module dependency", METADATA_MODULE));
    feed.publish(&CommitRecord::new(ids(&[1, 2, 3, 4, 5])));

    (service, feed)
}

#[test]
fn test_trailing_word_is_prefix_without_space() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _feed) = corpus(&temp_dir);

    let results = service.search(&SearchQuery::prefix("family test")).unwrap();
    assert!(results.contains(ComponentId(1)));
    assert!(results.contains(ComponentId(3)));
    assert!(results.contains(ComponentId(4)));
    assert!(!results.contains(ComponentId(2)));
}

#[test]
fn test_trailing_space_makes_every_word_exact() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _feed) = corpus(&temp_dir);

    let results = service.search(&SearchQuery::prefix("family test ")).unwrap();
    assert!(!results.contains(ComponentId(1)));
    assert!(results.is_empty());

    let exact = service.search(&SearchQuery::prefix("family tests ")).unwrap();
    assert_eq!(exact.component_ids(), vec![ComponentId(4)]);
}

#[test]
fn test_prefix_matching_ignores_case() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _feed) = corpus(&temp_dir);

    let results = service.search(&SearchQuery::prefix("TESTUD")).unwrap();
    assert_eq!(results.component_ids(), vec![ComponentId(1)]);
}

#[test]
fn test_blank_prefix_query_returns_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _feed) = corpus(&temp_dir);

    assert!(service.search(&SearchQuery::prefix("   ")).unwrap().is_empty());
}

#[test]
fn test_assemblage_restriction() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _feed) = corpus(&temp_dir);

    let one = service
        .search(&SearchQuery::prefix("family").restricted_to([ComponentId(900)]))
        .unwrap();
    assert_eq!(one.component_ids(), vec![ComponentId(3)]);

    let either = service
        .search(&SearchQuery::prefix("family").restricted_to([ComponentId(900), ComponentId(901)]))
        .unwrap();
    let mut found = either.component_ids();
    found.sort();
    assert_eq!(found, vec![ComponentId(3), ComponentId(4)]);
}

#[test]
fn test_metadata_only_restriction() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _feed) = corpus(&temp_dir);

    let results = service
        .search(&SearchQuery::parsed("family").metadata_only())
        .unwrap();
    assert_eq!(results.component_ids(), vec![ComponentId(5)]);
}

#[test]
fn test_malformed_parser_query_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _feed) = corpus(&temp_dir);

    let err = service.query("nosuchfield:family", 10).unwrap_err();
    assert!(matches!(err, SearchError::QuerySyntax { .. }));
}
