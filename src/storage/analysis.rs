//! Per-field text analysis
//!
//! Every text field exists twice: once run through the standard analyzer
//! (splits on non-alphanumerics, lowercases) and once through the whitespace
//! analyzer (splits on whitespace only, keeps punctuation verbatim).

use tantivy::Index;
use tantivy::schema::Field;
use tantivy::tokenizer::{
    LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer, WhitespaceTokenizer,
};

use super::{StorageError, StorageResult};

/// Tokenizer name of the natural-language analyzer
pub const STANDARD_ANALYZER: &str = "termindex_standard";

/// Tokenizer name of the verbatim analyzer
pub const WHITESPACE_ANALYZER: &str = "termindex_whitespace";

/// Suffix of the physical field holding the whitespace variant
pub const WHITESPACE_SUFFIX: &str = "_wsp";

/// Tokens longer than this are dropped by the standard analyzer
const MAX_TOKEN_LEN: usize = 40;

/// Which analysis strategy a physical field uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    Standard,
    Whitespace,
}

impl Analysis {
    pub fn tokenizer_name(&self) -> &'static str {
        match self {
            Self::Standard => STANDARD_ANALYZER,
            Self::Whitespace => WHITESPACE_ANALYZER,
        }
    }

    pub fn analyzer(&self) -> TextAnalyzer {
        match self {
            Self::Standard => TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
                .filter(LowerCaser)
                .build(),
            Self::Whitespace => TextAnalyzer::builder(WhitespaceTokenizer::default())
                .filter(LowerCaser)
                .build(),
        }
    }
}

/// Register both analyzers on an index; must run after every open
pub fn register_analyzers(index: &Index) {
    for analysis in [Analysis::Standard, Analysis::Whitespace] {
        index
            .tokenizers()
            .register(analysis.tokenizer_name(), analysis.analyzer());
    }
}

/// Run the analyzer registered for `field` over `text`
pub fn tokenize(index: &Index, field: Field, text: &str) -> StorageResult<Vec<String>> {
    let mut analyzer = index
        .tokenizer_for_field(field)
        .map_err(|e| StorageError::TantivyOperation {
            operation: "tokenize".to_string(),
            cause: e.to_string(),
        })?;
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    Ok(tokens)
}
