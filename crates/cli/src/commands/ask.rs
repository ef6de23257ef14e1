//! Ask command handler.
//!
//! Ingests the given documents, then streams one cited answer to stdout.

use super::ingest_paths;
use clap::Args;
use futures::{Stream, StreamExt};
use pagecite_core::{config::AppConfig, AppResult};
use pagecite_knowledge::{Assistant, Citation, StreamEvent};
use std::io::Write;
use std::path::PathBuf;

/// Ask one question over the given documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Document or directory to ingest first (.txt, .md); repeatable
    #[arg(short, long = "doc", required = true)]
    pub docs: Vec<PathBuf>,

    /// Print every stream event as one JSON line
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let assistant = Assistant::from_config(config)?;
        let chunks = ingest_paths(&assistant, &self.docs).await?;
        tracing::info!(chunks, "Documents ready");

        let mut out = std::io::stdout();
        render(assistant.ask(self.question.as_str()), self.json, &mut out).await
    }
}

/// Write an answer stream to `out`: text as it arrives and a source list at
/// the end, or one JSON line per event.
async fn render<S, W>(mut events: S, json: bool, out: &mut W) -> AppResult<()>
where
    S: Stream<Item = StreamEvent> + Unpin,
    W: Write,
{
    let mut citations = Vec::new();

    while let Some(event) = events.next().await {
        if json {
            writeln!(out, "{}", event.to_json())?;
            if event.is_done() {
                break;
            }
            continue;
        }

        match event {
            StreamEvent::Tool(notice) => tracing::info!(tool = %notice.name, "{}", notice.message),
            StreamEvent::Text(text) => {
                write!(out, "{}", text)?;
                out.flush()?;
            }
            StreamEvent::Citation(citation) => citations.push(citation),
            StreamEvent::Done => break,
        }
    }

    if !json {
        writeln!(out)?;
        if !citations.is_empty() {
            writeln!(out, "\nSources:")?;
            for citation in &citations {
                writeln!(out, "{}", format_citation(citation))?;
            }
        }
    }

    Ok(())
}

fn format_citation(citation: &Citation) -> String {
    format!(
        "[{}] {}, page {}: {}",
        citation.id, citation.document, citation.page, citation.snippet
    )
}
