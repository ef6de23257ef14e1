//! Prompt loader: built-in answer prompt plus YAML overrides.

use crate::types::PromptDefinition;
use pagecite_core::{AppError, AppResult};
use std::path::Path;

/// Identifier of the prompt used by the answer pipeline.
pub const ANSWER_PROMPT_ID: &str = "answer.default";

/// Phrase the generator must use when the context does not answer the question.
pub const NOT_FOUND_SENTINEL: &str = "I could not find this information in the provided documents.";

const DEFAULT_SYSTEM: &str = "You are a document assistant. Answer ONLY using the context below. \
Each passage is tagged with its document and page. Do not use outside knowledge. \
If the context does not contain the answer, reply exactly: \"{{notFound}}\"";

const DEFAULT_TEMPLATE: &str = "Context:\n{{context}}\n\nQuestion:\n{{query}}\n";

/// The built-in answer prompt.
pub fn default_answer_prompt() -> PromptDefinition {
    PromptDefinition {
        id: ANSWER_PROMPT_ID.to_string(),
        title: "Grounded document answer".to_string(),
        api_version: "1.0".to_string(),
        system: DEFAULT_SYSTEM.to_string(),
        template: DEFAULT_TEMPLATE.to_string(),
        not_found: NOT_FOUND_SENTINEL.to_string(),
    }
}

/// Load a prompt definition by ID.
///
/// Looks for `<workspace>/.pagecite/prompts/<id>.yml` first. When no file
/// exists, the built-in answer prompt is returned for [`ANSWER_PROMPT_ID`]
/// and any other id is an error.
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".pagecite/prompts")
        .join(format!("{}.yml", prompt_id));

    if !prompt_file.exists() {
        if prompt_id == ANSWER_PROMPT_ID {
            tracing::debug!("Using built-in prompt '{}'", prompt_id);
            return Ok(default_answer_prompt());
        }
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.template.contains("{{context}}") {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' must reference {{{{context}}}}",
            def.id
        )));
    }

    if def.not_found.trim().is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' needs a notFound phrase",
            def.id
        )));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
