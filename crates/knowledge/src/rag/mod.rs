//! Streaming answers grounded in retrieved passages.

pub mod buffer;
pub mod pipeline;
pub mod types;

pub use buffer::LineBuffer;
pub use pipeline::{AnswerPipeline, EventStream, PipelineOptions};
pub use types::{Citation, StreamEvent, ToolNotice, SEARCH_TOOL_NAME};
