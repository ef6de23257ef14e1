//! Corpus manager: the source of truth for which documents are ingested.
//!
//! New documents are appended to the live index incrementally. Replacing a
//! document (same name, different content) or removing one rebuilds the
//! index from every tracked document, since an append-only index cannot
//! drop entries. Tracked state is only committed once the retriever has
//! accepted the change.

use crate::chunker::Chunker;
use crate::parser;
use crate::retriever::{RetrievalSession, RetrieverState};
use crate::types::{Chunk, CorpusStats, DocumentRecord, PageText};
use chrono::Utc;
use pagecite_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct TrackedDocument {
    record: DocumentRecord,
    pages: Vec<PageText>,
    chunks: Vec<Chunk>,
}

/// Tracks ingested documents and keeps the retriever in sync with them.
pub struct CorpusManager {
    retriever: Arc<RetrievalSession>,
    chunker: Chunker,
    documents: Mutex<Vec<TrackedDocument>>,
}

fn content_hash(pages: &[PageText]) -> String {
    let mut hasher = Sha256::new();
    for page in pages {
        hasher.update(page.page.to_le_bytes());
        hasher.update(page.text.as_bytes());
        hasher.update([0x0C]);
    }
    format!("{:x}", hasher.finalize())
}

fn all_chunks(documents: &[TrackedDocument]) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|d| d.chunks.iter().cloned())
        .collect()
}

impl CorpusManager {
    pub fn new(retriever: Arc<RetrievalSession>, chunker: Chunker) -> Self {
        Self {
            retriever,
            chunker,
            documents: Mutex::new(Vec::new()),
        }
    }

    pub fn retriever(&self) -> &Arc<RetrievalSession> {
        &self.retriever
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Ingest one document from extracted pages.
    ///
    /// Returns the document's chunk count. Re-uploading identical content
    /// under the same name changes nothing.
    pub async fn upload_one(&self, name: &str, pages: &[PageText]) -> AppResult<usize> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Knowledge(
                "Document name cannot be empty".to_string(),
            ));
        }

        let chunks = self.chunker.chunk_document(name, pages);
        if chunks.is_empty() {
            return Err(AppError::EmptyDocument(name.to_string()));
        }

        let record = DocumentRecord {
            name: name.to_string(),
            pages: pages.len() as u32,
            chunk_count: chunks.len(),
            content_hash: content_hash(pages),
            ingested_at: Utc::now(),
        };
        let incoming = TrackedDocument {
            record,
            pages: pages.to_vec(),
            chunks,
        };
        let count = incoming.record.chunk_count;

        let mut documents = self.documents.lock().await;
        let ready = self.retriever.state().await == RetrieverState::Ready;
        let existing = documents.iter().position(|d| d.record.name == name);

        match existing {
            Some(pos)
                if ready && documents[pos].record.content_hash == incoming.record.content_hash =>
            {
                tracing::info!(document = name, "Document unchanged, skipping");
                Ok(documents[pos].record.chunk_count)
            }
            Some(pos) => {
                let mut next = documents.clone();
                next[pos] = incoming;
                self.retriever.init(all_chunks(&next)).await?;
                *documents = next;
                tracing::info!(document = name, chunks = count, "Document replaced, index rebuilt");
                Ok(count)
            }
            None if ready => {
                self.retriever.add(incoming.chunks.clone()).await?;
                documents.push(incoming);
                tracing::info!(document = name, chunks = count, "Document appended");
                Ok(count)
            }
            None => {
                let mut next = documents.clone();
                next.push(incoming);
                self.retriever.init(all_chunks(&next)).await?;
                *documents = next;
                tracing::info!(document = name, chunks = count, "Document ingested, index built");
                Ok(count)
            }
        }
    }

    /// Ingest raw text, splitting pages on form feeds.
    pub async fn upload_text(&self, name: &str, raw: &str) -> AppResult<usize> {
        let pages = parser::extract_text(raw);
        self.upload_one(name, &pages).await
    }

    /// Remove a document and rebuild the index from the rest.
    ///
    /// Returns the number of chunks dropped.
    pub async fn remove(&self, name: &str) -> AppResult<usize> {
        let mut documents = self.documents.lock().await;
        let pos = documents
            .iter()
            .position(|d| d.record.name == name)
            .ok_or_else(|| AppError::DocumentNotFound(name.to_string()))?;

        let mut next = documents.clone();
        let removed = next.remove(pos);

        if next.is_empty() {
            self.retriever.reset().await;
        } else {
            self.retriever.init(all_chunks(&next)).await?;
        }
        *documents = next;

        tracing::info!(
            document = name,
            chunks = removed.record.chunk_count,
            "Document removed"
        );
        Ok(removed.record.chunk_count)
    }

    /// Forget every document and reset the retriever.
    pub async fn reset_all(&self) {
        let mut documents = self.documents.lock().await;
        let dropped = documents.len();
        documents.clear();
        self.retriever.reset().await;
        tracing::info!(documents = dropped, "Corpus reset");
    }

    /// Tracked documents in upload order.
    pub async fn documents(&self) -> Vec<DocumentRecord> {
        self.documents
            .lock()
            .await
            .iter()
            .map(|d| d.record.clone())
            .collect()
    }

    /// Stored page text of a tracked document.
    pub async fn pages(&self, name: &str) -> AppResult<Vec<PageText>> {
        self.documents
            .lock()
            .await
            .iter()
            .find(|d| d.record.name == name)
            .map(|d| d.pages.clone())
            .ok_or_else(|| AppError::DocumentNotFound(name.to_string()))
    }

    pub async fn stats(&self) -> CorpusStats {
        let documents = self.documents.lock().await;
        CorpusStats {
            documents: documents.len(),
            chunks: documents.iter().map(|d| d.record.chunk_count).sum(),
            indexed: self.retriever.len().await,
        }
    }
}
