//! Ollama embedding provider.
//!
//! Calls Ollama's `/api/embeddings` endpoint (one text per request) with
//! bounded retries. The output dimension is learned from the first
//! successful response and enforced for the lifetime of the provider.

use crate::embeddings::l2_normalize;
use crate::embeddings::provider::EmbeddingProvider;
use pagecite_core::config::EmbeddingSettings;
use pagecite_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Maximum attempts per text
const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Ollama embedding provider.
#[derive(Debug)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    max_retries: u32,
    dimensions: OnceLock<usize>,
}

impl OllamaProvider {
    /// Build a provider from settings. No request is made until first use.
    pub fn new(settings: &EmbeddingSettings) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::Config(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            max_retries: MAX_RETRIES,
            dimensions: OnceLock::new(),
        })
    }

    /// Override the number of attempts per text (minimum 1).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    async fn embed_with_retries(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut attempt = 0;

        loop {
            match self.embed_single(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_retries => {
                    attempt += 1;
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    warn!(
                        "Embedding failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt, self.max_retries, backoff_ms, e
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn embed_single(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::BackendTimeout(format!("Ollama embeddings timed out: {}", e))
                } else {
                    AppError::BackendUnavailable(format!("Failed to reach Ollama: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|r| r.error)
                .unwrap_or(error_text);
            return Err(AppError::BackendUnavailable(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::BackendUnavailable(format!("Failed to parse Ollama response: {}", e))
        })?;

        self.accept(body.embedding)
    }

    /// Check the dimension against the one fixed by the first response.
    fn accept(&self, mut embedding: Vec<f32>) -> AppResult<Vec<f32>> {
        if embedding.is_empty() {
            return Err(AppError::BackendUnavailable(format!(
                "Ollama returned an empty embedding for model '{}'",
                self.model
            )));
        }

        let expected = *self.dimensions.get_or_init(|| {
            debug!(dimensions = embedding.len(), "Discovered embedding dimension");
            embedding.len()
        });
        if embedding.len() != expected {
            return Err(AppError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }

        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions.get().copied()
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "ollama", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        // The endpoint takes one prompt per request
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_with_retries(text).await?);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::StubHttpServer;

    fn settings(endpoint: &str) -> EmbeddingSettings {
        EmbeddingSettings {
            provider: "ollama".to_string(),
            endpoint: endpoint.to_string(),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_embeddings_are_normalized_and_dimension_discovered() {
        let server = StubHttpServer::start(vec![
            (200, r#"{"embedding":[3.0,4.0]}"#.to_string()),
            (200, r#"{"embedding":[0.0,2.0]}"#.to_string()),
        ])
        .await;
        let provider = OllamaProvider::new(&settings(&server.url())).unwrap();
        assert_eq!(provider.dimensions(), None);

        let embeddings = provider
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(embeddings, vec![vec![0.6, 0.8], vec![0.0, 1.0]]);
        assert_eq!(provider.dimensions(), Some(2));

        let requests = server.requests().await;
        assert!(requests[0].contains("\"model\":\"nomic-embed-text\""));
        assert!(requests[0].contains("POST /api/embeddings"));
    }

    #[tokio::test]
    async fn test_dimension_change_is_rejected() {
        let server = StubHttpServer::start(vec![
            (200, r#"{"embedding":[1.0,0.0]}"#.to_string()),
            (200, r#"{"embedding":[1.0,0.0,0.0]}"#.to_string()),
        ])
        .await;
        let provider = OllamaProvider::new(&settings(&server.url())).unwrap();

        provider.embed("first").await.unwrap();
        let err = provider.embed("second").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let server = StubHttpServer::start(vec![
            (503, r#"{"error":"loading model"}"#.to_string()),
            (200, r#"{"embedding":[1.0]}"#.to_string()),
        ])
        .await;
        let provider = OllamaProvider::new(&settings(&server.url())).unwrap();

        assert_eq!(provider.embed("text").await.unwrap(), vec![1.0]);
        assert_eq!(server.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        let provider = OllamaProvider::new(&settings("http://127.0.0.1:9"))
            .unwrap()
            .with_max_retries(1);

        let err = provider.embed("text").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
