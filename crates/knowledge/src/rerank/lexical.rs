//! Term-overlap reranker that runs without a model.

use super::Reranker;
use pagecite_core::AppResult;
use std::collections::{HashMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "what", "how", "why", "who", "when", "where", "does", "do", "did", "can",
];

const PHRASE_BONUS: f32 = 0.5;

fn terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Deterministic scorer: query-term coverage, damped term frequency, and a
/// bonus when the query's content words appear as a contiguous phrase.
#[derive(Debug, Default, Clone)]
pub struct LexicalReranker;

impl LexicalReranker {
    pub fn new() -> Self {
        Self
    }

    /// Score one passage against pre-tokenized query terms.
    pub fn score_one(&self, query_terms: &[String], passage: &str) -> f32 {
        let unique: HashSet<&str> = query_terms.iter().map(String::as_str).collect();
        if unique.is_empty() {
            return 0.0;
        }

        let passage_terms = terms(passage);
        let mut tf: HashMap<&str, u32> = HashMap::new();
        for term in &passage_terms {
            *tf.entry(term.as_str()).or_insert(0) += 1;
        }

        let mut matched = 0usize;
        let mut weight = 0.0f32;
        for term in &unique {
            if let Some(count) = tf.get(term) {
                matched += 1;
                weight += 1.0 + (*count as f32).ln();
            }
        }

        let coverage = matched as f32 / unique.len() as f32;
        let density = weight / (1.0 + passage_terms.len() as f32).sqrt();

        let phrase = if query_terms.len() > 1
            && passage_terms
                .windows(query_terms.len())
                .any(|w| w == query_terms)
        {
            PHRASE_BONUS
        } else {
            0.0
        };

        coverage + density + phrase
    }
}

#[async_trait::async_trait]
impl Reranker for LexicalReranker {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(&self, query: &str, passages: &[String]) -> AppResult<Vec<f32>> {
        let query_terms = terms(query);
        Ok(passages
            .iter()
            .map(|passage| self.score_one(&query_terms, passage))
            .collect())
    }
}
