//! Stream event types.

use crate::types::RankedChunk;
use pagecite_core::config::MAX_SNIPPET_CHARS;
use serde::{Deserialize, Serialize};

/// Name of the retrieval tool announced at the start of every answer.
pub const SEARCH_TOOL_NAME: &str = "semantic_search";

/// Announcement that a tool started running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolNotice {
    pub name: String,
    pub message: String,
}

impl ToolNotice {
    pub fn search(message: impl Into<String>) -> Self {
        Self {
            name: SEARCH_TOOL_NAME.to_string(),
            message: message.into(),
        }
    }
}

/// Pointer from an answer back to the passage that supported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position in the result list
    pub id: usize,
    pub document: String,
    pub page: u32,
    /// Leading characters of the passage
    pub snippet: String,
}

impl Citation {
    /// Cite `ranked` as result number `id`, truncating its text to
    /// `snippet_chars` characters, never more than [`MAX_SNIPPET_CHARS`].
    pub fn new(id: usize, ranked: &RankedChunk, snippet_chars: usize) -> Self {
        let limit = snippet_chars.min(MAX_SNIPPET_CHARS);
        Self {
            id,
            document: ranked.chunk.document.clone(),
            page: ranked.chunk.page,
            snippet: ranked.chunk.text.chars().take(limit).collect(),
        }
    }
}

/// One event of an answer stream.
///
/// A well-formed stream is: `Tool` (unless the query was rejected), any
/// number of `Text`, any number of `Citation`, then exactly one `Done`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Tool(ToolNotice),
    Text(String),
    Citation(Citation),
    Done,
}

impl StreamEvent {
    /// Event kind as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Tool(_) => "tool",
            StreamEvent::Text(_) => "text",
            StreamEvent::Citation(_) => "citation",
            StreamEvent::Done => "done",
        }
    }

    /// Event payload as used on the wire: JSON for structured events, the
    /// raw fragment for text, `{}` for done.
    pub fn payload(&self) -> String {
        match self {
            StreamEvent::Tool(notice) => serde_json::to_string(notice).unwrap_or_default(),
            StreamEvent::Text(text) => text.clone(),
            StreamEvent::Citation(citation) => {
                serde_json::to_string(citation).unwrap_or_default()
            }
            StreamEvent::Done => "{}".to_string(),
        }
    }

    /// Self-describing JSON form: `{"event": <name>, "data": <payload>}`.
    pub fn to_json(&self) -> serde_json::Value {
        let data = match self {
            StreamEvent::Tool(notice) => serde_json::to_value(notice).unwrap_or_default(),
            StreamEvent::Text(text) => serde_json::Value::String(text.clone()),
            StreamEvent::Citation(citation) => {
                serde_json::to_value(citation).unwrap_or_default()
            }
            StreamEvent::Done => serde_json::json!({}),
        };
        serde_json::json!({ "event": self.name(), "data": data })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }
}
