//! Answer streaming pipeline.
//!
//! [`AnswerPipeline::stream`] spawns a producer task that searches, builds
//! a grounded prompt, streams the generator's tokens and finally cites its
//! sources. Events travel over a bounded channel to a single consumer.
//! When the consumer drops its end, the producer notices at its next send
//! or backend poll and stops, dropping the backend stream with it.
//!
//! Failures never escape the stream: they become a final text event and
//! the stream still ends with exactly one `Done`.

use crate::rag::buffer::LineBuffer;
use crate::rag::types::{Citation, StreamEvent, ToolNotice};
use crate::retriever::{RetrievalSession, DEFAULT_TOP_K};
use crate::types::RankedChunk;
use futures::StreamExt;
use pagecite_core::{AppConfig, AppError, AppResult};
use pagecite_llm::{LlmClient, LlmRequest};
use pagecite_prompt::{build_prompt, BuiltPrompt, ContextPassage, PromptDefinition};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

pub const EMPTY_QUERY_MESSAGE: &str = "Please enter a question.";
pub const SEARCH_MESSAGE: &str = "Searching documents...";
pub const NO_RESULTS_MESSAGE: &str = "No relevant information found in the document.";
pub const NOT_READY_MESSAGE: &str =
    "No documents have been ingested yet. Upload a document and try again.";
pub const SEARCH_FAILED_MESSAGE: &str =
    "Document search is temporarily unavailable. Please try again.";
pub const INTERRUPTED_MESSAGE: &str =
    "[The answer was interrupted because the language model stopped responding.]";

/// Consumer side of an answer stream.
pub type EventStream = ReceiverStream<StreamEvent>;

/// Knobs for answer generation.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub model: String,
    pub top_k: usize,
    pub snippet_chars: usize,
    pub max_context_chars: usize,
    /// Longest silence tolerated between two backend tokens
    pub token_timeout: Duration,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub channel_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            top_k: DEFAULT_TOP_K,
            snippet_chars: 160,
            max_context_chars: 6000,
            token_timeout: Duration::from_secs(60),
            temperature: None,
            max_tokens: None,
            channel_capacity: 32,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.generation.model.clone(),
            top_k: config.retrieval.top_k,
            snippet_chars: config.retrieval.snippet_chars,
            max_context_chars: config.retrieval.max_context_chars,
            token_timeout: Duration::from_secs(config.generation.token_timeout_secs),
            temperature: Some(config.generation.temperature),
            max_tokens: config.generation.max_tokens,
            ..Self::default()
        }
    }
}

/// Produces answer event streams over a shared retriever.
pub struct AnswerPipeline {
    retriever: Arc<RetrievalSession>,
    llm: Arc<dyn LlmClient>,
    prompt: Arc<PromptDefinition>,
    options: PipelineOptions,
}

impl AnswerPipeline {
    pub fn new(
        retriever: Arc<RetrievalSession>,
        llm: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        options: PipelineOptions,
    ) -> Self {
        Self {
            retriever,
            llm,
            prompt: Arc::new(prompt),
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Start answering `query`. Must be called inside a Tokio runtime.
    pub fn stream(&self, query: impl Into<String>) -> EventStream {
        let (tx, rx) = mpsc::channel(self.options.channel_capacity.max(1));
        let producer = Producer {
            retriever: Arc::clone(&self.retriever),
            llm: Arc::clone(&self.llm),
            prompt: Arc::clone(&self.prompt),
            options: self.options.clone(),
            tx,
        };
        let query = query.into();
        let span = tracing::info_span!("answer", query_chars = query.chars().count());
        tokio::spawn(producer.run(query).instrument(span));
        ReceiverStream::new(rx)
    }
}

/// The consumer went away.
struct Disconnected;

struct Producer {
    retriever: Arc<RetrievalSession>,
    llm: Arc<dyn LlmClient>,
    prompt: Arc<PromptDefinition>,
    options: PipelineOptions,
    tx: mpsc::Sender<StreamEvent>,
}

impl Producer {
    async fn run(self, query: String) {
        match self.produce(query.trim()).await {
            Ok(()) => tracing::debug!("Answer stream completed"),
            Err(Disconnected) => tracing::info!("Consumer disconnected, answer stream stopped"),
        }
    }

    async fn emit(&self, event: StreamEvent) -> Result<(), Disconnected> {
        self.tx.send(event).await.map_err(|_| Disconnected)
    }

    /// Emit a final message and close the stream.
    async fn finish_with(&self, message: &str) -> Result<(), Disconnected> {
        self.emit(StreamEvent::Text(message.to_string())).await?;
        self.emit(StreamEvent::Done).await
    }

    async fn produce(&self, query: &str) -> Result<(), Disconnected> {
        if query.is_empty() {
            return self.finish_with(EMPTY_QUERY_MESSAGE).await;
        }

        self.emit(StreamEvent::Tool(ToolNotice::search(SEARCH_MESSAGE)))
            .await?;

        let searched = tokio::select! {
            biased;
            _ = self.tx.closed() => return Err(Disconnected),
            searched = self.retriever.search(query, self.options.top_k) => searched,
        };

        let results = match searched {
            Ok(results) => results,
            Err(AppError::NotInitialized) => return self.finish_with(NOT_READY_MESSAGE).await,
            Err(e) => {
                tracing::warn!(error = %e, "Search failed");
                return self.finish_with(SEARCH_FAILED_MESSAGE).await;
            }
        };

        if results.is_empty() {
            return self.finish_with(NO_RESULTS_MESSAGE).await;
        }

        tracing::info!(
            results = results.len(),
            top_score = results[0].score,
            "Context retrieved"
        );

        let completed = match self.build(query, &results) {
            Ok(prompt) => self.generate(prompt).await?,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt construction failed");
                self.emit(StreamEvent::Text(INTERRUPTED_MESSAGE.to_string()))
                    .await?;
                false
            }
        };

        if completed {
            for (i, ranked) in results.iter().enumerate() {
                let citation = Citation::new(i + 1, ranked, self.options.snippet_chars);
                self.emit(StreamEvent::Citation(citation)).await?;
            }
        }

        self.emit(StreamEvent::Done).await
    }

    fn build(&self, query: &str, results: &[RankedChunk]) -> AppResult<BuiltPrompt> {
        let passages: Vec<ContextPassage> = results
            .iter()
            .map(|r| ContextPassage {
                document: r.chunk.document.clone(),
                page: r.chunk.page,
                text: r.chunk.text.clone(),
            })
            .collect();

        build_prompt(
            &self.prompt,
            query,
            &passages,
            self.options.max_context_chars,
        )
    }

    /// Stream generated text. Returns whether generation ran to completion.
    async fn generate(&self, prompt: BuiltPrompt) -> Result<bool, Disconnected> {
        let mut request = LlmRequest::new(prompt.user, self.options.model.as_str());
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let opened = tokio::select! {
            biased;
            _ = self.tx.closed() => return Err(Disconnected),
            opened = self.llm.stream(&request) => opened,
        };
        let mut tokens = match opened {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "Generation backend unavailable");
                self.emit(StreamEvent::Text(INTERRUPTED_MESSAGE.to_string()))
                    .await?;
                return Ok(false);
            }
        };

        let mut buffer = LineBuffer::new();
        let mut emitted = 0usize;
        let outcome: AppResult<()> = loop {
            let next = tokio::select! {
                biased;
                _ = self.tx.closed() => return Err(Disconnected),
                next = tokio::time::timeout(self.options.token_timeout, tokens.next()) => next,
            };

            match next {
                Err(_) => {
                    break Err(AppError::BackendTimeout(format!(
                        "no token within {:?}",
                        self.options.token_timeout
                    )))
                }
                Ok(None) => break Ok(()),
                Ok(Some(Err(e))) => break Err(e),
                Ok(Some(Ok(chunk))) => {
                    if let Some(text) = buffer.push(&chunk.content) {
                        self.emit(StreamEvent::Text(text)).await?;
                        emitted += 1;
                    }
                    if chunk.done {
                        break Ok(());
                    }
                }
            }
        };

        if let Some(rest) = buffer.flush() {
            self.emit(StreamEvent::Text(rest)).await?;
            emitted += 1;
        }

        match outcome {
            Ok(()) => {
                tracing::debug!(text_events = emitted, "Generation finished");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, text_events = emitted, "Generation interrupted");
                self.emit(StreamEvent::Text(INTERRUPTED_MESSAGE.to_string()))
                    .await?;
                Ok(false)
            }
        }
    }
}
