//! Answer prompts for pagecite.
//!
//! This crate provides:
//! - The built-in grounded-answer prompt and YAML overrides
//! - Handlebars template rendering
//! - Context assembly bounded by a character budget

pub mod builder;
pub mod loader;
pub mod types;

pub use builder::{build_prompt, format_context};
pub use loader::{default_answer_prompt, load_prompt, ANSWER_PROMPT_ID, NOT_FOUND_SENTINEL};
pub use types::{BuiltPrompt, BuiltPromptMetadata, ContextPassage, PromptDefinition};
