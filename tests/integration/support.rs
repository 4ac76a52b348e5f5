//! Fixtures shared by the integration tests

use std::path::Path;
use std::sync::Arc;
use termindex::graph::{ComponentVersion, Payload, SemanticValue};
use termindex::{
    CommitFeed, Component, ComponentId, ComponentKind, IndexService, JsonlComponentStore,
    Settings,
};

pub const CORE_MODULE: u64 = 1;
pub const METADATA_MODULE: u64 = 2;
pub const DEVELOPMENT_PATH: u64 = 3;
pub const SYNONYM_TYPE: u64 = 5;

/// Settings pointing at `root`, tuned for fast tests
pub fn settings(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.index.root = root.to_path_buf();
    settings.index.name = "terminology".to_string();
    settings.index.metadata_module = Some(METADATA_MODULE);
    settings.indexing.parallel_threads = 2;
    settings.indexing.queue_depth = 8;
    settings.refresh.max_stale_ms = 200;
    settings.refresh.min_stale_ms = 5;
    settings
}

pub fn description(id: u64, text: &str) -> Component {
    description_in(id, text, CORE_MODULE)
}

pub fn description_in(id: u64, text: &str, module: u64) -> Component {
    Component {
        id: ComponentId(id),
        kind: ComponentKind::Description,
        assemblage: None,
        versions: vec![ComponentVersion {
            module: ComponentId(module),
            path: ComponentId(DEVELOPMENT_PATH),
            payload: Payload::Description {
                text: text.to_string(),
                description_type: ComponentId(SYNONYM_TYPE),
            },
        }],
    }
}

pub fn semantic(id: u64, assemblage: u64, text: &str) -> Component {
    Component {
        id: ComponentId(id),
        kind: ComponentKind::Semantic,
        assemblage: Some(ComponentId(assemblage)),
        versions: vec![ComponentVersion {
            module: ComponentId(CORE_MODULE),
            path: ComponentId(DEVELOPMENT_PATH),
            payload: Payload::Semantic(vec![SemanticValue::Text(text.to_string())]),
        }],
    }
}

/// A started service over `store`, subscribed to `feed`
pub fn start(
    root: &Path,
    store: &Arc<JsonlComponentStore>,
    feed: &Arc<CommitFeed>,
) -> IndexService {
    IndexService::start(
        settings(root),
        store.clone(),
        store.clone(),
        Some(Arc::clone(feed)),
    )
    .unwrap()
}

pub fn ids(values: &[u64]) -> Vec<ComponentId> {
    values.iter().copied().map(ComponentId).collect()
}
