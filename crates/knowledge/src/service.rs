//! Wiring of the retrieval stack from configuration.

use crate::chunker::Chunker;
use crate::corpus::CorpusManager;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::parser::{self, ContentType};
use crate::rag::{AnswerPipeline, EventStream, PipelineOptions};
use crate::rerank::{create_reranker, Reranker};
use crate::retriever::{RetrievalOptions, RetrievalSession};
use pagecite_core::{AppConfig, AppError, AppResult};
use pagecite_llm::LlmClient;
use pagecite_prompt::{load_prompt, PromptDefinition, ANSWER_PROMPT_ID};
use std::path::Path;
use std::sync::Arc;

/// One retrieval session plus the corpus and answer pipeline built on it.
pub struct Assistant {
    corpus: CorpusManager,
    pipeline: AnswerPipeline,
}

impl Assistant {
    /// Build every collaborator from configuration.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let embedder = create_provider(&config.embedding)?;
        let reranker = create_reranker(&config.reranker)?;
        let llm = pagecite_llm::create_client(&config.generation)?;
        let prompt = load_prompt(&config.workspace, ANSWER_PROMPT_ID)?;

        tracing::info!(
            embedder = embedder.provider_name(),
            reranker = reranker.name(),
            generator = llm.provider_name(),
            model = %config.generation.model,
            "Assistant configured"
        );

        Self::assemble(config, embedder, reranker, llm, prompt)
    }

    /// Build from explicit collaborators; retrieval parameters still come
    /// from `config`.
    pub fn assemble(
        config: &AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        reranker: Arc<dyn Reranker>,
        llm: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
    ) -> AppResult<Self> {
        let chunker = Chunker::new(config.retrieval.chunk_size, config.retrieval.chunk_overlap)?;
        let options = RetrievalOptions::from(&config.retrieval);
        let retriever = Arc::new(
            RetrievalSession::new(embedder, reranker)
                .with_recall_k(options.recall_k)
                .with_batch_size(config.embedding.batch_size),
        );

        let pipeline = AnswerPipeline::new(
            Arc::clone(&retriever),
            llm,
            prompt,
            PipelineOptions {
                top_k: options.top_k,
                ..PipelineOptions::from_config(config)
            },
        );
        let corpus = CorpusManager::new(retriever, chunker);

        Ok(Self { corpus, pipeline })
    }

    pub fn corpus(&self) -> &CorpusManager {
        &self.corpus
    }

    pub fn pipeline(&self) -> &AnswerPipeline {
        &self.pipeline
    }

    /// Stream an answer to `query`.
    pub fn ask(&self, query: impl Into<String>) -> EventStream {
        self.pipeline.stream(query)
    }

    /// Extract and ingest a file, named by its file name.
    pub async fn ingest_file(&self, path: &Path) -> AppResult<usize> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::Knowledge(format!("Not a file path: {:?}", path)))?;

        self.ingest_file_as(path, &name).await
    }

    /// Extract and ingest a file under an explicit document name.
    pub async fn ingest_file_as(&self, path: &Path, name: &str) -> AppResult<usize> {
        if !ContentType::from_path(path).is_supported() {
            return Err(AppError::Knowledge(format!(
                "Unsupported file type: {:?} (expected .txt or .md)",
                path
            )));
        }

        let pages = parser::extract_pages(path)?;
        self.corpus.upload_one(name, &pages).await
    }
}
