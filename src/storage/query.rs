//! Query construction and result collapsing
//!
//! Two ways to turn caller text into a tantivy query:
//! - parser mode runs the standard query grammar against both variants of
//!   the content field
//! - prefix mode tokenizes the text with each field's own analyzer and treats
//!   the last token as a prefix unless the text ends in whitespace
//!
//! Either can be narrowed to a set of assemblages or to metadata records.

use super::analysis::tokenize;
use super::schema::{FieldPair, IndexSchema, METADATA_MARKER};
use super::StorageResult;
use crate::{ComponentId, GenerationTarget, SearchError, SearchHit, SearchResult};
use std::collections::HashSet;
use std::time::Duration;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, RegexQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::{Index, Term};

/// Default number of hits returned when the caller does not say
pub const DEFAULT_LIMIT: usize = 10;

/// How query text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Boolean/phrase query grammar
    #[default]
    Parsed,
    /// Type-ahead: trailing partial word matches as a prefix
    Prefix,
}

/// A fully described search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub mode: QueryMode,
    /// Only match records in one of these assemblages (empty = any)
    pub restrict_to: Vec<ComponentId>,
    pub metadata_only: bool,
    pub limit: usize,
    pub target: GenerationTarget,
    /// Bound for `GenerationTarget::At` waits; falls back to the configured default
    pub wait_timeout: Option<Duration>,
}

impl SearchQuery {
    pub fn parsed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: QueryMode::Parsed,
            restrict_to: Vec::new(),
            metadata_only: false,
            limit: DEFAULT_LIMIT,
            target: GenerationTarget::NoWait,
            wait_timeout: None,
        }
    }

    pub fn prefix(text: impl Into<String>) -> Self {
        Self {
            mode: QueryMode::Prefix,
            ..Self::parsed(text)
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn restricted_to(mut self, assemblages: impl IntoIterator<Item = ComponentId>) -> Self {
        self.restrict_to.extend(assemblages);
        self
    }

    pub fn metadata_only(mut self) -> Self {
        self.metadata_only = true;
        self
    }

    pub fn at_generation(mut self, target: GenerationTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Build the tantivy query, or `None` when prefix text has no tokens
    pub fn build(
        &self,
        index: &Index,
        schema: &IndexSchema,
    ) -> SearchResult<Option<Box<dyn Query>>> {
        let main = match self.mode {
            QueryMode::Parsed => Some(parsed_clause(index, &schema.content, &self.text)?),
            QueryMode::Prefix => prefix_clause(index, &schema.content, &self.text)?,
        };
        let Some(main) = main else {
            return Ok(None);
        };

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, main)];

        if !self.restrict_to.is_empty() {
            clauses.push((
                Occur::Must,
                assemblage_clause(schema.assemblage, &self.restrict_to),
            ));
        }

        if self.metadata_only {
            clauses.push((Occur::Must, metadata_clause(schema.metadata)));
        }

        Ok(Some(Box::new(BooleanQuery::new(clauses))))
    }
}

/// Parse `text` against both field variants and OR the results
fn parsed_clause(index: &Index, pair: &FieldPair, text: &str) -> SearchResult<Box<dyn Query>> {
    let mut variants: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(2);
    for (field, _) in pair.fields() {
        let parser = QueryParser::for_index(index, vec![field]);
        let query = parser
            .parse_query(text)
            .map_err(|e| SearchError::QuerySyntax {
                query: text.to_string(),
                reason: e.to_string(),
            })?;
        variants.push((Occur::Should, query));
    }
    Ok(Box::new(BooleanQuery::new(variants)))
}

/// Tokenize per field; every token but an unfinished last one must match exactly
fn prefix_clause(
    index: &Index,
    pair: &FieldPair,
    text: &str,
) -> StorageResult<Option<Box<dyn Query>>> {
    // A trailing space means the last word is complete
    let last_is_partial = !text.ends_with(char::is_whitespace);

    let mut variants: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(2);
    for (field, _) in pair.fields() {
        let tokens = tokenize(index, field, text)?;
        let Some((last, complete)) = tokens.split_last() else {
            continue;
        };

        let mut required: Vec<(Occur, Box<dyn Query>)> = complete
            .iter()
            .map(|token| (Occur::Must, exact_term(field, token)))
            .collect();

        if last_is_partial {
            let pattern = format!("{}.*", regex::escape(last));
            required.push((
                Occur::Must,
                Box::new(RegexQuery::from_pattern(&pattern, field)?),
            ));
        } else {
            required.push((Occur::Must, exact_term(field, last)));
        }

        variants.push((Occur::Should, Box::new(BooleanQuery::new(required))));
    }

    if variants.is_empty() {
        return Ok(None);
    }
    Ok(Some(Box::new(BooleanQuery::new(variants))))
}

fn exact_term(field: Field, token: &str) -> Box<dyn Query> {
    Box::new(TermQuery::new(
        Term::from_field_text(field, token),
        IndexRecordOption::WithFreqs,
    ))
}

fn assemblage_clause(field: Field, assemblages: &[ComponentId]) -> Box<dyn Query> {
    let any_of = assemblages
        .iter()
        .map(|id| {
            let term = Term::from_field_u64(field, id.value());
            let query: Box<dyn Query> = Box::new(TermQuery::new(term, IndexRecordOption::Basic));
            (Occur::Should, query)
        })
        .collect();
    Box::new(BooleanQuery::new(any_of))
}

fn metadata_clause(field: Field) -> Box<dyn Query> {
    Box::new(TermQuery::new(
        Term::from_field_u64(field, METADATA_MARKER),
        IndexRecordOption::Basic,
    ))
}

/// Internal fetch size: `limit` plus `headroom_percent` (rounded up)
pub fn fetch_limit(limit: usize, headroom_percent: usize) -> usize {
    let extra = limit.saturating_mul(headroom_percent).div_ceil(100);
    limit.saturating_add(extra)
}

/// Keep the first (best-ranked) hit per component, up to `limit`
pub fn collapse(ranked: impl IntoIterator<Item = SearchHit>, limit: usize) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    let mut hits = Vec::with_capacity(limit);
    for hit in ranked {
        if hits.len() >= limit {
            break;
        }
        if seen.insert(hit.component_id) {
            hits.push(hit);
        }
    }
    hits
}
