//! Index schema
//!
//! One document per indexed record version. The component id is stored but
//! never indexed; everything else is indexed but not stored.

use super::analysis::{Analysis, WHITESPACE_SUFFIX};
use tantivy::schema::{
    Field, FieldType, IndexRecordOption, NumericOptions, STRING, Schema, SchemaBuilder,
    TextFieldIndexing, TextOptions,
};

pub const COMPONENT_ID: &str = "component_id";
pub const CONTENT: &str = "content";
pub const DESCRIPTION_TYPE: &str = "description_type";
pub const ASSEMBLAGE: &str = "assemblage";
pub const KIND: &str = "kind";
pub const MODULE: &str = "module";
pub const PATH: &str = "path";
pub const METADATA: &str = "metadata";

/// Value of the metadata marker field
pub const METADATA_MARKER: u64 = 1;

/// The two physical variants of one logical text field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPair {
    pub tokenized: Field,
    pub verbatim: Field,
}

impl FieldPair {
    pub fn fields(&self) -> [(Field, Analysis); 2] {
        [
            (self.tokenized, Analysis::Standard),
            (self.verbatim, Analysis::Whitespace),
        ]
    }
}

/// Schema fields for the component index
#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub component_id: Field,
    pub content: FieldPair,
    pub description_type: Field,
    pub assemblage: Field,
    pub kind: Field,
    pub module: Field,
    pub path: Field,
    pub metadata: Field,
}

fn text_options(analysis: Analysis) -> TextOptions {
    TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(analysis.tokenizer_name())
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    )
}

fn add_text_pair(builder: &mut SchemaBuilder, name: &str) -> FieldPair {
    let tokenized = builder.add_text_field(name, text_options(Analysis::Standard));
    let verbatim = builder.add_text_field(
        &format!("{name}{WHITESPACE_SUFFIX}"),
        text_options(Analysis::Whitespace),
    );
    FieldPair {
        tokenized,
        verbatim,
    }
}

impl IndexSchema {
    /// Create the schema for indexing graph components
    pub fn build() -> (Schema, IndexSchema) {
        let mut builder = SchemaBuilder::default();

        // Stored for correlation and dedup, never searchable
        let component_id = builder.add_u64_field(
            COMPONENT_ID,
            NumericOptions::default().set_stored().set_fast(),
        );

        let content = add_text_pair(&mut builder, CONTENT);

        let indexed_u64 = NumericOptions::default().set_indexed();
        let description_type = builder.add_u64_field(DESCRIPTION_TYPE, indexed_u64.clone());
        let assemblage = builder.add_u64_field(ASSEMBLAGE, indexed_u64.clone());
        let metadata = builder.add_u64_field(METADATA, indexed_u64);

        let kind = builder.add_text_field(KIND, STRING);
        let module = builder.add_text_field(MODULE, STRING);
        let path = builder.add_text_field(PATH, STRING);

        let schema = builder.build();
        let index_schema = IndexSchema {
            component_id,
            content,
            description_type,
            assemblage,
            kind,
            module,
            path,
            metadata,
        };

        (schema, index_schema)
    }

    /// Describe how `found` differs from the schema this build writes,
    /// or `None` when every expected field exists with the same type
    pub fn incompatibility(found: &Schema) -> Option<String> {
        let (expected, _) = Self::build();
        for (_, entry) in expected.fields() {
            let name = entry.name();
            let Ok(field) = found.get_field(name) else {
                return Some(format!("field '{name}' is missing"));
            };
            let actual: &FieldType = found.get_field_entry(field).field_type();
            if actual != entry.field_type() {
                return Some(format!("field '{name}' has an unexpected type"));
            }
        }
        None
    }
}
