//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text of one page, as produced by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number
    pub page: u32,

    /// Raw page text (not yet whitespace-normalized)
    pub text: String,
}

impl PageText {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
        }
    }
}

/// A bounded slice of a document page with positional identity.
///
/// Immutable once created by the chunker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source document name
    pub document: String,

    /// 1-based page number
    pub page: u32,

    /// `<document>_p<page>_c<index>`
    pub chunk_id: String,

    /// Normalized chunk text
    pub text: String,
}

impl Chunk {
    /// Build a chunk, deriving its id from document, page and sequence index.
    pub fn new(document: &str, page: u32, index: usize, text: impl Into<String>) -> Self {
        Self {
            document: document.to_string(),
            page,
            chunk_id: format!("{}_p{}_c{}", document, page, index),
            text: text.into(),
        }
    }
}

/// A chunk paired with its rerank score for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// A document tracked by the corpus manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document name (unique within the corpus)
    pub name: String,

    /// Pages that contributed text
    pub pages: u32,

    /// Number of chunks derived from the document
    pub chunk_count: usize,

    /// SHA-256 of the extracted page text
    pub content_hash: String,

    /// When the document was ingested
    pub ingested_at: DateTime<Utc>,
}

/// Corpus-wide statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusStats {
    pub documents: usize,
    pub chunks: usize,
    /// Entries currently held by the live index
    pub indexed: usize,
}
