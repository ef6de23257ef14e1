//! Pairwise relevance scoring for the precision stage.

pub mod http;
pub mod lexical;

pub use http::HttpReranker;
pub use lexical::LexicalReranker;

use pagecite_core::config::RerankerSettings;
use pagecite_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Scores (query, passage) pairs. Higher is more relevant; no fixed range.
#[async_trait::async_trait]
pub trait Reranker: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Return one score per passage, parallel to `passages`.
    async fn score(&self, query: &str, passages: &[String]) -> AppResult<Vec<f32>>;
}

/// Create a reranker based on configuration.
pub fn create_reranker(settings: &RerankerSettings) -> AppResult<Arc<dyn Reranker>> {
    match settings.provider.as_str() {
        "lexical" => Ok(Arc::new(LexicalReranker::new())),

        "http" => {
            let endpoint = settings.endpoint.as_deref().ok_or_else(|| {
                AppError::InvalidConfig("reranker.endpoint is required for the http reranker".to_string())
            })?;
            Ok(Arc::new(HttpReranker::new(
                endpoint,
                Duration::from_secs(settings.timeout_secs),
            )?))
        }

        _ => Err(AppError::InvalidConfig(format!(
            "Unknown reranker provider: '{}'. Supported providers: lexical, http",
            settings.provider
        ))),
    }
}
