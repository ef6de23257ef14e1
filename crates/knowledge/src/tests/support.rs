//! Deterministic collaborators for tests.

use crate::embeddings::{l2_normalize, EmbeddingProvider};
use crate::rerank::Reranker;
use futures::StreamExt;
use pagecite_core::{AppError, AppResult};
use pagecite_llm::{LlmClient, LlmRequest, LlmStream, LlmStreamChunk};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Bag-of-words embedder over a hashed vocabulary.
///
/// Texts containing `fail_on` make the whole batch fail; texts containing
/// `wide_on` come back one dimension too long.
#[derive(Debug, Default)]
pub struct StubEmbedder {
    pub dim: usize,
    pub fail_on: Option<String>,
    pub wide_on: Option<String>,
    pub calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    pub fn wide_on(mut self, marker: &str) -> Self {
        self.wide_on = Some(marker.to_string());
        self
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let wide = self.wide_on.as_deref().is_some_and(|m| text.contains(m));
        let dim = if wide { self.dim + 1 } else { self.dim };
        let mut v = vec![0.0f32; dim];
        v[0] = 0.01;
        for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if word.len() < 3 {
                continue;
            }
            let hash = word
                .bytes()
                .fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            v[(hash % dim as u64) as usize] += 1.0;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn provider_name(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> &str {
        "stub-bow"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dim)
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_on {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                return Err(AppError::BackendUnavailable("stub embedder down".to_string()));
            }
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// How [`StubReranker`] scores passages.
#[derive(Debug, Clone, Copy)]
pub enum RerankMode {
    /// Score = passage length in characters
    Length,
    /// Every passage gets the same score
    Constant,
    /// Always fails
    Failing,
    /// Returns one score fewer than requested
    Short,
}

#[derive(Debug)]
pub struct StubReranker {
    pub mode: RerankMode,
    pub seen: Mutex<Vec<usize>>,
}

impl StubReranker {
    pub fn new(mode: RerankMode) -> Self {
        Self {
            mode,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Candidate counts seen per call.
    pub fn seen(&self) -> Vec<usize> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Reranker for StubReranker {
    fn name(&self) -> &str {
        "stub"
    }

    async fn score(&self, _query: &str, passages: &[String]) -> AppResult<Vec<f32>> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(passages.len());
        }
        match self.mode {
            RerankMode::Length => Ok(passages.iter().map(|p| p.chars().count() as f32).collect()),
            RerankMode::Constant => Ok(vec![1.0; passages.len()]),
            RerankMode::Failing => Err(AppError::BackendTimeout("stub reranker slow".to_string())),
            RerankMode::Short => Ok(vec![1.0; passages.len().saturating_sub(1)]),
        }
    }
}

/// What [`ScriptedLlm`] does after its scripted tokens run out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LlmEnding {
    /// Finish normally with a done chunk
    Done,
    /// Yield a transport error
    Fail,
    /// Never yield again
    Stall,
    /// Keep producing tokens forever, one every millisecond
    Endless,
}

/// Generative backend that replays a fixed token script.
#[derive(Debug)]
pub struct ScriptedLlm {
    pub tokens: Vec<String>,
    pub ending: LlmEnding,
    pub refuse: bool,
    pub produced: Arc<AtomicUsize>,
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new(tokens: &[&str], ending: LlmEnding) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ending,
            refuse: false,
            produced: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail when opening the stream.
    pub fn unreachable() -> Self {
        Self {
            refuse: true,
            ..Self::new(&[], LlmEnding::Done)
        }
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if self.refuse {
            return Err(AppError::BackendUnavailable("connection refused".to_string()));
        }

        let counted = {
            let produced = Arc::clone(&self.produced);
            move |chunk: AppResult<LlmStreamChunk>| {
                produced.fetch_add(1, Ordering::SeqCst);
                chunk
            }
        };

        let script = futures::stream::iter(
            self.tokens
                .clone()
                .into_iter()
                .map(|t| Ok(LlmStreamChunk::text(t, "scripted"))),
        )
        .map(counted.clone());

        let tail: LlmStream = match self.ending {
            LlmEnding::Done => Box::pin(futures::stream::iter(vec![Ok(LlmStreamChunk {
                content: String::new(),
                model: "scripted".to_string(),
                done: true,
                usage: None,
            })])),
            LlmEnding::Fail => Box::pin(futures::stream::iter(vec![Err(
                AppError::BackendUnavailable("connection reset".to_string()),
            )])),
            LlmEnding::Stall => Box::pin(futures::stream::pending()),
            LlmEnding::Endless => Box::pin(
                futures::stream::unfold((), |_| async {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    Some((Ok(LlmStreamChunk::text("more ", "scripted")), ()))
                })
                .map(counted),
            ),
        };

        Ok(Box::pin(script.chain(tail)))
    }
}

/// One-shot HTTP server answering queued `(status, body)` responses in order.
pub struct StubHttpServer {
    addr: SocketAddr,
    requests: Arc<tokio::sync::Mutex<Vec<String>>>,
    _task: tokio::task::JoinHandle<()>,
}

impl StubHttpServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);

        let task = tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                log.lock().await.push(request);

                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    if status < 400 { "OK" } else { "Error" },
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            addr,
            requests,
            _task: task,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Raw requests received so far.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let Ok(n) = socket.read(&mut chunk).await else {
            break;
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}
