//! Offline assistant for command tests.

use futures::stream;
use pagecite_core::{AppConfig, AppResult};
use pagecite_knowledge::{create_provider, create_reranker, Assistant};
use pagecite_llm::{LlmClient, LlmRequest, LlmStream, LlmStreamChunk};
use pagecite_prompt::default_answer_prompt;
use std::sync::Arc;

/// Generator replaying fixed tokens.
#[derive(Debug)]
pub struct FixedLlm {
    tokens: Vec<String>,
}

#[async_trait::async_trait]
impl LlmClient for FixedLlm {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    async fn stream(&self, _request: &LlmRequest) -> AppResult<LlmStream> {
        let chunks: Vec<AppResult<LlmStreamChunk>> = self
            .tokens
            .iter()
            .map(|t| Ok(LlmStreamChunk::text(t.clone(), "fixed")))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// Assistant with the built-in trigram embedder, lexical reranker and a
/// generator that answers with `tokens`.
pub fn assistant(tokens: &[&str]) -> Assistant {
    let config = AppConfig::default();
    let llm = Arc::new(FixedLlm {
        tokens: tokens.iter().map(|t| t.to_string()).collect(),
    });
    Assistant::assemble(
        &config,
        create_provider(&config.embedding).unwrap(),
        create_reranker(&config.reranker).unwrap(),
        llm,
        default_answer_prompt(),
    )
    .unwrap()
}
