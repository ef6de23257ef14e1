//! Prompt types for pagecite.

use serde::{Deserialize, Serialize};

/// A prompt definition, built in or loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// System instruction (Handlebars syntax)
    pub system: String,

    /// User message template (Handlebars syntax)
    pub template: String,

    /// Sentinel phrase the model must emit when the context is insufficient
    #[serde(rename = "notFound")]
    pub not_found: String,
}

/// One retrieved passage offered to the generator as context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextPassage {
    pub document: String,
    pub page: u32,
    pub text: String,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Passages that made it into the context
    #[serde(rename = "passagesIncluded")]
    pub passages_included: usize,

    /// Passages left out because the context budget ran out
    #[serde(rename = "passagesDropped")]
    pub passages_dropped: usize,

    /// Characters of rendered context
    #[serde(rename = "contextChars")]
    pub context_chars: usize,
}
