//! LLM provider factory.
//!
//! Resolves the generation settings from the application configuration into
//! a concrete client.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use pagecite_core::config::GenerationSettings;
use pagecite_core::AppResult;
use std::sync::Arc;
use std::time::Duration;

/// Create the generative client described by `settings`.
///
/// Ollama is the only generation backend; the endpoint may point at any
/// Ollama-compatible server.
pub fn create_client(settings: &GenerationSettings) -> AppResult<Arc<dyn LlmClient>> {
    tracing::debug!(
        endpoint = %settings.endpoint,
        model = %settings.model,
        "Creating generation client"
    );

    let client = OllamaClient::with_connect_timeout(
        settings.endpoint.as_str(),
        Duration::from_secs(settings.connect_timeout_secs),
    )?;

    Ok(Arc::new(client))
}
