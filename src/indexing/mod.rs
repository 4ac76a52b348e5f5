pub mod document;
pub mod generation;
pub mod pipeline;
pub mod pool;
pub mod progress;

pub use document::{
    BuiltDocument, ConceptFields, DescriptionFields, DocumentBuilder, DocumentSink,
    FieldContributor, SemanticFields,
};
pub use generation::{GenerationTracker, IndexingHandle};
pub use pipeline::{CommitPipeline, CommitReport};
pub use pool::{JobHandle, WorkerPool};
pub use progress::{IndexCounters, IndexStats};
