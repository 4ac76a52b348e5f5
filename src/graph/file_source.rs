//! File-backed record store
//!
//! Reads one JSON object per line. A line is either a component snapshot or
//! a tag binding (`{"tag_for": 1, "tag": "core-module"}`). A later snapshot
//! for the same id replaces the earlier one.

use super::{Component, ComponentSource, TagResolver};
use crate::{ComponentId, IndexError, IndexResult};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum Line {
    Tag { tag_for: ComponentId, tag: String },
    Component(Component),
}

/// In-memory record store, optionally loaded from a JSON-lines file
#[derive(Debug, Default)]
pub struct JsonlComponentStore {
    components: RwLock<BTreeMap<ComponentId, Component>>,
    tags: RwLock<HashMap<ComponentId, String>>,
}

impl JsonlComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON-lines file
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| IndexError::RecordSource {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let store = Self::new();
        store
            .load_str(&content)
            .map_err(|reason| IndexError::RecordSource {
                path: path.to_path_buf(),
                reason,
            })?;
        Ok(store)
    }

    /// Parse JSON lines into the store, skipping blank lines and `#` comments
    pub fn load_str(&self, content: &str) -> Result<usize, String> {
        let mut loaded = 0;
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match serde_json::from_str::<Line>(line) {
                Ok(Line::Tag { tag_for, tag }) => {
                    self.tags.write().insert(tag_for, tag);
                }
                Ok(Line::Component(component)) => {
                    self.upsert(component);
                    loaded += 1;
                }
                Err(e) => return Err(format!("line {}: {e}", number + 1)),
            }
        }
        Ok(loaded)
    }

    /// Insert or replace a record snapshot
    pub fn upsert(&self, component: Component) {
        self.components.write().insert(component.id, component);
    }

    pub fn set_tag(&self, id: ComponentId, tag: impl Into<String>) {
        self.tags.write().insert(id, tag.into());
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }
}

impl ComponentSource for JsonlComponentStore {
    fn fetch(&self, id: ComponentId) -> Result<Option<Component>, String> {
        Ok(self.components.read().get(&id).cloned())
    }

    fn all_ids(&self) -> Vec<ComponentId> {
        self.components.read().keys().copied().collect()
    }
}

impl TagResolver for JsonlComponentStore {
    fn resolve(&self, id: ComponentId) -> Option<String> {
        self.tags
            .read()
            .get(&id)
            .cloned()
            .or_else(|| Some(id.to_string()))
    }
}
