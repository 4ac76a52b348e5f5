//! Building index documents from graph components
//!
//! Each record kind has a [`FieldContributor`] that decides what content the
//! record puts into the index. The [`DocumentBuilder`] runs the contributors
//! that accept a record and adds the fields every document shares.

use crate::graph::{Component, ComponentKind, Payload, SemanticValue, TagResolver};
use crate::storage::schema::{
    ASSEMBLAGE, COMPONENT_ID, CONTENT, DESCRIPTION_TYPE, IndexSchema, KIND, METADATA,
    METADATA_MARKER, MODULE, PATH,
};
use crate::ComponentId;
use std::collections::BTreeSet;
use std::sync::Arc;
use tantivy::TantivyDocument as Document;

/// Write access to one document under construction
pub struct DocumentSink<'a> {
    schema: &'a IndexSchema,
    doc: Document,
    written: Vec<&'static str>,
    content_values: usize,
}

impl<'a> DocumentSink<'a> {
    fn new(schema: &'a IndexSchema, id: ComponentId) -> Self {
        let mut doc = Document::new();
        doc.add_u64(schema.component_id, id.value());
        Self {
            schema,
            doc,
            written: vec![COMPONENT_ID],
            content_values: 0,
        }
    }

    /// Add searchable text under both analysis variants; blank text is ignored
    pub fn add_content(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.doc.add_text(self.schema.content.tokenized, text);
        self.doc.add_text(self.schema.content.verbatim, text);
        self.content_values += 1;
        self.written.push(CONTENT);
    }

    pub fn add_description_type(&mut self, description_type: ComponentId) {
        self.doc
            .add_u64(self.schema.description_type, description_type.value());
        self.written.push(DESCRIPTION_TYPE);
    }

    fn add_kind(&mut self, kind: ComponentKind) {
        self.doc.add_text(self.schema.kind, kind.as_str());
        self.written.push(KIND);
    }

    fn add_assemblage(&mut self, assemblage: ComponentId) {
        self.doc.add_u64(self.schema.assemblage, assemblage.value());
        self.written.push(ASSEMBLAGE);
    }

    fn add_module(&mut self, tag: &str) {
        self.doc.add_text(self.schema.module, tag);
        self.written.push(MODULE);
    }

    fn add_path(&mut self, tag: &str) {
        self.doc.add_text(self.schema.path, tag);
        self.written.push(PATH);
    }

    fn mark_metadata(&mut self) {
        self.doc.add_u64(self.schema.metadata, METADATA_MARKER);
        self.written.push(METADATA);
    }

    pub fn has_content(&self) -> bool {
        self.content_values > 0
    }
}

/// A document ready to hand to the writer
#[derive(Debug)]
pub struct BuiltDocument {
    pub document: Document,
    /// Name of every field value written, repeated once per value
    pub fields: Vec<&'static str>,
}

/// Decides which fields a record kind contributes
pub trait FieldContributor: Send + Sync {
    fn name(&self) -> &'static str;

    fn accepts(&self, component: &Component) -> bool;

    fn build_fields(&self, component: &Component, sink: &mut DocumentSink<'_>);

    /// Whether a record with no content values is still worth indexing
    fn requires_content(&self) -> bool {
        true
    }
}

/// Description text and type from every version
#[derive(Debug, Default, Clone, Copy)]
pub struct DescriptionFields;

impl FieldContributor for DescriptionFields {
    fn name(&self) -> &'static str {
        "description"
    }

    fn accepts(&self, component: &Component) -> bool {
        component.kind == ComponentKind::Description
    }

    fn build_fields(&self, component: &Component, sink: &mut DocumentSink<'_>) {
        for version in &component.versions {
            if let Payload::Description {
                text,
                description_type,
            } = &version.payload
            {
                sink.add_content(text);
                sink.add_description_type(*description_type);
            }
        }
    }
}

/// String, long and component-reference values of semantic annotations
#[derive(Debug, Default, Clone, Copy)]
pub struct SemanticFields;

impl FieldContributor for SemanticFields {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn accepts(&self, component: &Component) -> bool {
        component.kind == ComponentKind::Semantic
    }

    fn build_fields(&self, component: &Component, sink: &mut DocumentSink<'_>) {
        for version in &component.versions {
            let Payload::Semantic(values) = &version.payload else {
                continue;
            };
            for value in values {
                match value {
                    SemanticValue::Text(text) => sink.add_content(text),
                    SemanticValue::Long(number) => sink.add_content(&number.to_string()),
                    SemanticValue::Component(id) => sink.add_content(&id.to_string()),
                }
            }
        }
    }
}

/// Concepts carry no text of their own; only the shared tags are indexed
#[derive(Debug, Default, Clone, Copy)]
pub struct ConceptFields;

impl FieldContributor for ConceptFields {
    fn name(&self) -> &'static str {
        "concept"
    }

    fn accepts(&self, component: &Component) -> bool {
        component.kind == ComponentKind::Concept
    }

    fn build_fields(&self, _component: &Component, _sink: &mut DocumentSink<'_>) {}

    fn requires_content(&self) -> bool {
        false
    }
}

/// Maps components to index documents
pub struct DocumentBuilder {
    schema: IndexSchema,
    contributors: Vec<Box<dyn FieldContributor>>,
    tags: Arc<dyn TagResolver>,
    metadata_module: Option<ComponentId>,
}

impl std::fmt::Debug for DocumentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.contributors.iter().map(|c| c.name()).collect();
        f.debug_struct("DocumentBuilder")
            .field("contributors", &names)
            .field("metadata_module", &self.metadata_module)
            .finish()
    }
}

impl DocumentBuilder {
    /// Builder with the description and semantic contributors
    pub fn new(schema: IndexSchema, tags: Arc<dyn TagResolver>) -> Self {
        Self {
            schema,
            contributors: vec![Box::new(DescriptionFields), Box::new(SemanticFields)],
            tags,
            metadata_module: None,
        }
    }

    pub fn with_contributor(mut self, contributor: Box<dyn FieldContributor>) -> Self {
        self.contributors.push(contributor);
        self
    }

    /// Records living in this module get the metadata marker
    pub fn with_metadata_module(mut self, module: Option<ComponentId>) -> Self {
        self.metadata_module = module;
        self
    }

    pub fn contributor_names(&self) -> Vec<&'static str> {
        self.contributors.iter().map(|c| c.name()).collect()
    }

    /// Build the document for `component`, or `None` if it is filtered out
    pub fn build(&self, component: &Component) -> Option<BuiltDocument> {
        let mut sink = DocumentSink::new(&self.schema, component.id);
        let mut accepted = false;
        let mut content_optional = false;

        for contributor in &self.contributors {
            if contributor.accepts(component) {
                accepted = true;
                content_optional |= !contributor.requires_content();
                contributor.build_fields(component, &mut sink);
            }
        }

        if !accepted || (!sink.has_content() && !content_optional) {
            return None;
        }

        sink.add_kind(component.kind);
        if let Some(assemblage) = component.assemblage {
            sink.add_assemblage(assemblage);
        }

        let mut modules = BTreeSet::new();
        let mut paths = BTreeSet::new();
        for version in &component.versions {
            modules.insert(version.module);
            paths.insert(version.path);
        }
        for tag in modules.iter().filter_map(|id| self.tags.resolve(*id)) {
            sink.add_module(&tag);
        }
        for tag in paths.iter().filter_map(|id| self.tags.resolve(*id)) {
            sink.add_path(&tag);
        }

        if self
            .metadata_module
            .is_some_and(|module| component.in_module(module))
        {
            sink.mark_metadata();
        }

        Some(BuiltDocument {
            document: sink.doc,
            fields: sink.written,
        })
    }
}
