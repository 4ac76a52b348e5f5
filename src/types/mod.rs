use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Stable identifier of one versioned graph record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub u64);

impl ComponentId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ComponentId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Index durability marker. Strictly increasing for the lifetime of one index.
pub type Generation = u64;

/// Which generation a query must observe before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationTarget {
    /// Search whatever snapshot is currently published.
    #[default]
    NoWait,
    /// Block until this generation is visible to readers.
    At(Generation),
    /// Force a synchronous refresh and search everything committed so far.
    Latest,
}

/// Result of a resolved generation latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The document was added and will be visible at this generation.
    Indexed(Generation),
    /// The record produced no document (filtered out or indexing disabled).
    NotIndexed,
}

impl IndexOutcome {
    pub fn generation(&self) -> Option<Generation> {
        match self {
            Self::Indexed(generation) => Some(*generation),
            Self::NotIndexed => None,
        }
    }
}

/// Result of waiting for a generation to become searchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Readers now see at least the requested generation.
    Visible(Generation),
    /// The timeout elapsed first.
    NotYetVisible,
}

impl WaitOutcome {
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Visible(_))
    }
}

/// On-disk state of an index directory, computed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexValidity {
    /// Directory absent or empty.
    Missing,
    /// Directory holds a readable index.
    Populated,
    /// Directory holds files this build cannot read.
    FormatIncompatible,
}

impl fmt::Display for IndexValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Missing => "missing",
            Self::Populated => "populated",
            Self::FormatIncompatible => "format-incompatible",
        };
        f.write_str(label)
    }
}

/// One deduplicated query hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    pub component_id: ComponentId,
    pub score: f32,
}

/// Ranked, deduplicated hits plus the generation they were read at.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Generation visible in the searcher snapshot that served the query.
    pub generation: Generation,
    /// False when a bounded generation wait timed out before the query ran.
    pub target_reached: bool,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.hits.iter().map(|hit| hit.component_id).collect()
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.hits.iter().any(|hit| hit.component_id == id)
    }
}

/// Converts a millisecond setting into a `Duration`, treating zero as "none".
pub fn millis(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_millis(value))
}
