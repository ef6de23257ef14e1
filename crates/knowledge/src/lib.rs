//! Retrieval and answer streaming over ingested documents.
//!
//! Documents are split into page-tagged chunks, embedded into an exact
//! in-memory vector index, recalled by similarity, reranked pairwise, and
//! finally used as context for a streamed, cited answer.

pub mod chunker;
pub mod corpus;
pub mod embeddings;
pub mod parser;
pub mod rag;
pub mod rerank;
pub mod retriever;
pub mod service;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::{chunk, normalize_whitespace, Chunker};
pub use corpus::CorpusManager;
pub use embeddings::{create_provider, EmbeddingProvider};
pub use rag::{AnswerPipeline, Citation, EventStream, PipelineOptions, StreamEvent, ToolNotice};
pub use rerank::{create_reranker, Reranker};
pub use retriever::{RetrievalOptions, RetrievalSession, RetrieverState};
pub use service::Assistant;
pub use types::{Chunk, CorpusStats, DocumentRecord, PageText, RankedChunk};
pub use vector_index::{FlatIndex, VectorIndex};
