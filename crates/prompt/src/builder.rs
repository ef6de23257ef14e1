//! Prompt builder for rendering templates and injecting retrieved context.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, ContextPassage, PromptDefinition};
use handlebars::Handlebars;
use pagecite_core::{AppError, AppResult};
use std::collections::HashMap;

const PASSAGE_SEPARATOR: &str = "\n\n";

/// Build an answer prompt from a definition, the user query, and ranked passages.
///
/// Passages are rendered in the order given, each tagged with its document
/// and page, until `max_context_chars` is reached. The first passage is
/// truncated to fit rather than dropped, so a non-empty passage list never
/// produces an empty context.
///
/// # Example
/// ```no_run
/// use pagecite_prompt::{build_prompt, default_answer_prompt, ContextPassage};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let passages = vec![ContextPassage {
///     document: "handbook.txt".to_string(),
///     page: 2,
///     text: "Refunds are issued within 14 days.".to_string(),
/// }];
///
/// let built = build_prompt(&default_answer_prompt(), "How long do refunds take?", &passages, 6000)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    query: &str,
    passages: &[ContextPassage],
    max_context_chars: usize,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let (context, included) = format_context(passages, max_context_chars);
    let dropped = passages.len() - included;
    if dropped > 0 {
        tracing::debug!(included, dropped, "Context budget reached");
    }

    let mut variables = HashMap::new();
    variables.insert("query".to_string(), query.trim().to_string());
    variables.insert("context".to_string(), context.clone());
    variables.insert("notFound".to_string(), definition.not_found.clone());

    let user = render_template(&definition.template, &variables)?;
    let system = if definition.system.trim().is_empty() {
        None
    } else {
        Some(render_template(&definition.system, &variables)?)
    };

    Ok(BuiltPrompt {
        system,
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            passages_included: included,
            passages_dropped: dropped,
            context_chars: context.chars().count(),
        },
    })
}

/// Render passages into a single context block of at most `budget` characters.
///
/// Returns the rendered block and how many passages it contains.
pub fn format_context(passages: &[ContextPassage], budget: usize) -> (String, usize) {
    let mut context = String::new();
    let mut used = 0usize;
    let mut included = 0usize;

    for passage in passages {
        let block = format!(
            "(Document: {}, Page {}) {}",
            passage.document, passage.page, passage.text
        );
        let separator = if included == 0 { 0 } else { PASSAGE_SEPARATOR.len() };
        let block_chars = block.chars().count();

        if used + separator + block_chars > budget {
            if included == 0 && budget > 0 {
                context.extend(block.chars().take(budget));
                included = 1;
            }
            break;
        }

        if included > 0 {
            context.push_str(PASSAGE_SEPARATOR);
        }
        context.push_str(&block);
        used += separator + block_chars;
        included += 1;
    }

    (context, included)
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text output, never HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
