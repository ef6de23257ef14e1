//! Two-stage retrieval: vector recall followed by pairwise reranking.
//!
//! A [`RetrievalSession`] owns the embedder, the reranker and the live
//! index. Its lifecycle is `Uninitialized -> Ready -> Uninitialized`:
//! `init` moves to `Ready`, `reset` moves back, `add` and `search` require
//! `Ready`.
//!
//! Ingestion (`init`, `add`, `reset`) is serialized by a dedicated mutex.
//! Embedding runs without holding the index lock; the index itself is only
//! touched under its write lock, as a single swap (`init`, `reset`) or a
//! pre-validated append (`add`), so a concurrent `search` never sees a
//! half-applied mutation and a failed ingestion leaves the prior index as
//! it was.

use crate::embeddings::EmbeddingProvider;
use crate::rerank::Reranker;
use crate::types::{Chunk, RankedChunk};
use crate::vector_index::{FlatIndex, VectorIndex};
use pagecite_core::config::RetrievalSettings;
use pagecite_core::{AppError, AppResult};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Candidates pulled from the index before reranking.
pub const DEFAULT_RECALL_K: usize = 10;

/// Results returned after reranking.
pub const DEFAULT_TOP_K: usize = 3;

const DEFAULT_BATCH_SIZE: usize = 64;

/// Retriever lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrieverState {
    Uninitialized,
    Ready,
}

/// Recall and precision stage sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalOptions {
    pub recall_k: usize,
    pub top_k: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            recall_k: DEFAULT_RECALL_K,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl From<&RetrievalSettings> for RetrievalOptions {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            recall_k: settings.recall_k,
            top_k: settings.top_k,
        }
    }
}

/// Owned retrieval state shared by ingestion and queries.
pub struct RetrievalSession {
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Arc<dyn Reranker>,
    index: RwLock<Option<FlatIndex>>,
    ingest: Mutex<()>,
    recall_k: usize,
    batch_size: usize,
}

impl RetrievalSession {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, reranker: Arc<dyn Reranker>) -> Self {
        Self {
            embedder,
            reranker,
            index: RwLock::new(None),
            ingest: Mutex::new(()),
            recall_k: DEFAULT_RECALL_K,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the recall-stage candidate count (minimum 1).
    pub fn with_recall_k(mut self, recall_k: usize) -> Self {
        self.recall_k = recall_k.max(1);
        self
    }

    /// Set how many texts are sent to the embedder per call (minimum 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn recall_k(&self) -> usize {
        self.recall_k
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn reranker(&self) -> &dyn Reranker {
        self.reranker.as_ref()
    }

    pub async fn state(&self) -> RetrieverState {
        if self.index.read().await.is_some() {
            RetrieverState::Ready
        } else {
            RetrieverState::Uninitialized
        }
    }

    /// Entries in the live index (0 when uninitialized).
    pub async fn len(&self) -> usize {
        self.index.read().await.as_ref().map_or(0, |i| i.len())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Embed chunk texts in batches, checking the provider returned one
    /// vector per text.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> AppResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self.embedder.embed_batch(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(AppError::BackendUnavailable(format!(
                    "Embedder returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    /// Build a fresh index from `chunks`, replacing any existing one.
    ///
    /// Returns the number of indexed chunks.
    pub async fn init(&self, chunks: Vec<Chunk>) -> AppResult<usize> {
        if chunks.is_empty() {
            return Err(AppError::EmptyCorpus);
        }
        let _guard = self.ingest.lock().await;

        let vectors = self.embed_chunks(&chunks).await?;
        let mut fresh = FlatIndex::new();
        fresh.add(vectors, chunks)?;
        let count = fresh.len();

        *self.index.write().await = Some(fresh);

        tracing::info!(
            chunks = count,
            embedder = self.embedder.provider_name(),
            "Retriever initialized"
        );
        Ok(count)
    }

    /// Embed and append `chunks` to the live index.
    ///
    /// Returns the number of chunks added.
    pub async fn add(&self, chunks: Vec<Chunk>) -> AppResult<usize> {
        let _guard = self.ingest.lock().await;

        if self.index.read().await.is_none() {
            return Err(AppError::NotInitialized);
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors = self.embed_chunks(&chunks).await?;
        let count = chunks.len();

        let mut slot = self.index.write().await;
        let index = slot.as_mut().ok_or(AppError::NotInitialized)?;
        index.add(vectors, chunks)?;

        tracing::info!(added = count, total = index.len(), "Retriever extended");
        Ok(count)
    }

    /// Recall `recall_k` candidates by similarity, rerank them against the
    /// query and return the best `top_k`, highest score first. Equal scores
    /// keep recall order.
    pub async fn search(&self, query: &str, top_k: usize) -> AppResult<Vec<RankedChunk>> {
        if self.index.read().await.is_none() {
            return Err(AppError::NotInitialized);
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;

        let candidates = {
            let slot = self.index.read().await;
            let index = slot.as_ref().ok_or(AppError::NotInitialized)?;
            index.search(&query_vector, self.recall_k)?
        };

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let passages: Vec<String> = candidates.iter().map(|(c, _)| c.text.clone()).collect();
        let scores = self.reranker.score(query, &passages).await?;
        if scores.len() != candidates.len() {
            return Err(AppError::BackendUnavailable(format!(
                "Reranker '{}' returned {} scores for {} candidates",
                self.reranker.name(),
                scores.len(),
                candidates.len()
            )));
        }

        let mut ranked: Vec<RankedChunk> = candidates
            .into_iter()
            .zip(scores)
            .map(|((chunk, _similarity), score)| RankedChunk { chunk, score })
            .collect();

        // Stable: ties keep recall order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(top_k);

        tracing::debug!(
            recall = passages.len(),
            returned = ranked.len(),
            top_score = ranked.first().map(|r| r.score),
            "Search completed"
        );

        Ok(ranked)
    }

    /// Drop the index. Safe to call in any state.
    pub async fn reset(&self) {
        let _guard = self.ingest.lock().await;
        let previous = self.index.write().await.take();
        if let Some(index) = previous {
            tracing::info!(dropped = index.len(), "Retriever reset");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{RerankMode, StubEmbedder, StubReranker};

    fn session(reranker: RerankMode) -> RetrievalSession {
        RetrievalSession::new(
            Arc::new(StubEmbedder::new(16)),
            Arc::new(StubReranker::new(reranker)),
        )
    }

    fn chunks(document: &str, texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::new(document, 1, i, *t))
            .collect()
    }

    #[tokio::test]
    async fn test_search_before_init_fails() {
        let session = session(RerankMode::Length);
        assert_eq!(session.state().await, RetrieverState::Uninitialized);
        assert!(matches!(
            session.search("anything", 3).await,
            Err(AppError::NotInitialized)
        ));
        assert!(matches!(
            session.add(chunks("a", &["x"])).await,
            Err(AppError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_init_with_no_chunks_is_empty_corpus() {
        let session = session(RerankMode::Length);
        assert!(matches!(
            session.init(Vec::new()).await,
            Err(AppError::EmptyCorpus)
        ));
        assert_eq!(session.state().await, RetrieverState::Uninitialized);
    }

    #[tokio::test]
    async fn test_results_bounded_and_sorted() {
        let session = session(RerankMode::Length);
        session
            .init(chunks(
                "doc",
                &["short", "a bit longer", "the longest passage of all", "mid size"],
            ))
            .await
            .unwrap();

        let results = session.search("passage", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(results[0].chunk.text, "the longest passage of all");
    }

    #[tokio::test]
    async fn test_recall_stage_size_is_independent_of_top_k() {
        let reranker = Arc::new(StubReranker::new(RerankMode::Length));
        let session = RetrievalSession::new(Arc::new(StubEmbedder::new(16)), reranker.clone())
            .with_recall_k(4);
        let texts: Vec<String> = (0..12).map(|i| format!("passage number {}", i)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        session.init(chunks("doc", &refs)).await.unwrap();

        let results = session.search("passage", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(reranker.seen(), vec![4]);
    }

    #[tokio::test]
    async fn test_equal_scores_keep_recall_order() {
        let session = session(RerankMode::Constant);
        session
            .init(chunks("doc", &["alpha beta", "gamma delta", "alpha gamma"]))
            .await
            .unwrap();

        let embedder = StubEmbedder::new(16);
        let query_vector = embedder.embed("alpha beta").await.unwrap();
        let recall_order: Vec<String> = {
            let slot = session.index.read().await;
            slot.as_ref()
                .unwrap()
                .search(&query_vector, 10)
                .unwrap()
                .into_iter()
                .map(|(c, _)| c.chunk_id)
                .collect()
        };

        let results = session.search("alpha beta", 3).await.unwrap();
        let ids: Vec<String> = results.into_iter().map(|r| r.chunk.chunk_id).collect();
        assert_eq!(ids, recall_order);
    }

    #[tokio::test]
    async fn test_failed_add_keeps_prior_index() {
        let session = RetrievalSession::new(
            Arc::new(StubEmbedder::new(8).failing_on("POISON").wide_on("WIDE")),
            Arc::new(StubReranker::new(RerankMode::Length)),
        );
        session.init(chunks("a", &["one", "two"])).await.unwrap();

        assert!(session.add(chunks("b", &["ok", "POISON"])).await.is_err());
        assert!(matches!(
            session.add(chunks("c", &["fine", "WIDE text"])).await,
            Err(AppError::DimensionMismatch { .. })
        ));

        assert_eq!(session.len().await, 2);
        assert_eq!(session.state().await, RetrieverState::Ready);
    }

    #[tokio::test]
    async fn test_failed_init_keeps_prior_index() {
        let session = RetrievalSession::new(
            Arc::new(StubEmbedder::new(8).failing_on("POISON")),
            Arc::new(StubReranker::new(RerankMode::Length)),
        );
        session.init(chunks("a", &["one", "two", "three"])).await.unwrap();

        assert!(session.init(chunks("b", &["POISON"])).await.is_err());
        assert_eq!(session.len().await, 3);
    }

    #[tokio::test]
    async fn test_embedding_is_batched() {
        let embedder = Arc::new(StubEmbedder::new(8));
        let session = RetrievalSession::new(
            embedder.clone(),
            Arc::new(StubReranker::new(RerankMode::Length)),
        )
        .with_batch_size(2);

        session
            .init(chunks("a", &["one", "two", "three", "four", "five"]))
            .await
            .unwrap();
        assert_eq!(
            embedder.calls.load(std::sync::atomic::Ordering::SeqCst),
            3
        );
    }

    #[tokio::test]
    async fn test_reranker_failures_propagate() {
        let failing = session(RerankMode::Failing);
        failing.init(chunks("a", &["one"])).await.unwrap();
        assert!(matches!(
            failing.search("one", 3).await,
            Err(AppError::BackendTimeout(_))
        ));

        let short = session(RerankMode::Short);
        short.init(chunks("a", &["one", "two"])).await.unwrap();
        assert!(matches!(
            short.search("one", 3).await,
            Err(AppError::BackendUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let session = session(RerankMode::Length);
        session.init(chunks("a", &["one"])).await.unwrap();

        session.reset().await;
        session.reset().await;

        assert_eq!(session.state().await, RetrieverState::Uninitialized);
        assert!(session.is_empty().await);
        assert!(matches!(
            session.search("one", 3).await,
            Err(AppError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_searches_during_ingestion_see_whole_batches() {
        let session = Arc::new(session(RerankMode::Length));
        session.init(chunks("base", &["seed passage"])).await.unwrap();

        let writer = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                for round in 0..20 {
                    let texts: Vec<String> =
                        (0..5).map(|i| format!("round {} item {}", round, i)).collect();
                    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                    session
                        .add(chunks(&format!("doc{}", round), &refs))
                        .await
                        .unwrap();
                }
            })
        };

        for _ in 0..50 {
            let len = session.len().await;
            assert_eq!((len - 1) % 5, 0);
            assert!(!session.search("item", 3).await.unwrap().is_empty());
            tokio::task::yield_now().await;
        }

        writer.await.unwrap();
        assert_eq!(session.len().await, 101);
    }
}
