//! Interfaces consumed from the versioned terminology graph
//!
//! The graph itself (concepts, descriptions, relationships and their commit
//! machinery) lives elsewhere. The index only needs to fetch records, resolve
//! module/path identifiers to external tags, and hear about commits.

mod feed;
mod file_source;

pub use feed::{CommitFeed, CommitListener, CommitRecord, SubscriptionId};
pub use file_source::JsonlComponentStore;

use crate::ComponentId;
use serde::{Deserialize, Serialize};

/// Broad category of a versioned record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Concept,
    Description,
    Semantic,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Description => "description",
            Self::Semantic => "semantic",
        }
    }
}

/// A single value carried by a semantic annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticValue {
    Text(String),
    Long(i64),
    Component(ComponentId),
}

/// Version-specific content of a record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    #[default]
    None,
    Description {
        text: String,
        description_type: ComponentId,
    },
    Semantic(Vec<SemanticValue>),
}

/// One version of a record, stamped with module and path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentVersion {
    pub module: ComponentId,
    pub path: ComponentId,
    #[serde(default)]
    pub payload: Payload,
}

/// A versioned graph record as the index sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub kind: ComponentKind,
    /// Assemblage (semantic type) this record belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assemblage: Option<ComponentId>,
    #[serde(default)]
    pub versions: Vec<ComponentVersion>,
}

impl Component {
    /// True if any version was written in the given module
    pub fn in_module(&self, module: ComponentId) -> bool {
        self.versions.iter().any(|version| version.module == module)
    }
}

/// Fetches authoritative record versions from the graph
pub trait ComponentSource: Send + Sync {
    /// Current versions of a record, or `None` if it does not exist
    fn fetch(&self, id: ComponentId) -> Result<Option<Component>, String>;

    /// Every record id that a full reindex should visit
    fn all_ids(&self) -> Vec<ComponentId>;
}

/// Resolves module/path identifiers to stable external tags
pub trait TagResolver: Send + Sync {
    fn resolve(&self, id: ComponentId) -> Option<String>;
}

/// Falls back to the decimal identifier when no richer tag exists
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericTags;

impl TagResolver for NumericTags {
    fn resolve(&self, id: ComponentId) -> Option<String> {
        Some(id.to_string())
    }
}
