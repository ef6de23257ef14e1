//! Client for a remote cross-encoder served behind a `/rerank` endpoint
//! (text-embeddings-inference request/response shape).

use super::Reranker;
use pagecite_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RerankHit {
    index: usize,
    score: f32,
}

/// Remote reranker.
#[derive(Debug)]
pub struct HttpReranker {
    client: Client,
    url: String,
}

impl HttpReranker {
    /// `endpoint` is the service base URL; `/rerank` is appended unless present.
    pub fn new(endpoint: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base = endpoint.trim_end_matches('/');
        let url = if base.ends_with("/rerank") {
            base.to_string()
        } else {
            format!("{}/rerank", base)
        };

        Ok(Self { client, url })
    }
}

/// Reorder hits into a score vector parallel to the submitted passages.
fn reassemble(hits: Vec<RerankHit>, expected: usize) -> AppResult<Vec<f32>> {
    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for hit in hits {
        let slot = scores.get_mut(hit.index).ok_or_else(|| {
            AppError::BackendUnavailable(format!(
                "Reranker returned index {} for {} passages",
                hit.index, expected
            ))
        })?;
        *slot = Some(hit.score);
    }

    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            s.ok_or_else(|| {
                AppError::BackendUnavailable(format!("Reranker returned no score for passage {}", i))
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl Reranker for HttpReranker {
    fn name(&self) -> &str {
        "http"
    }

    async fn score(&self, query: &str, passages: &[String]) -> AppResult<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.url)
            .json(&RerankRequest {
                query,
                texts: passages,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::BackendTimeout(format!("Reranker timed out: {}", e))
                } else {
                    AppError::BackendUnavailable(format!("Failed to reach reranker: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::BackendUnavailable(format!(
                "Reranker error ({}): {}",
                status, body
            )));
        }

        let hits: Vec<RerankHit> = response.json().await.map_err(|e| {
            AppError::BackendUnavailable(format!("Malformed reranker response: {}", e))
        })?;

        tracing::debug!(passages = passages.len(), "Reranked remotely");
        reassemble(hits, passages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::StubHttpServer;

    #[test]
    fn test_rerank_path_appended_once() {
        let a = HttpReranker::new("http://tei:8080/", Duration::from_secs(1)).unwrap();
        let b = HttpReranker::new("http://tei:8080/rerank", Duration::from_secs(1)).unwrap();
        assert_eq!(a.url, "http://tei:8080/rerank");
        assert_eq!(b.url, "http://tei:8080/rerank");
    }

    #[tokio::test]
    async fn test_scores_reassembled_in_passage_order() {
        let server = StubHttpServer::start(vec![(
            200,
            r#"[{"index":2,"score":0.9},{"index":0,"score":0.4},{"index":1,"score":-1.5}]"#
                .to_string(),
        )])
        .await;
        let reranker = HttpReranker::new(&server.url(), Duration::from_secs(5)).unwrap();

        let passages = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let scores = reranker.score("q", &passages).await.unwrap();

        assert_eq!(scores, vec![0.4, -1.5, 0.9]);
        let requests = server.requests().await;
        assert!(requests[0].contains("POST /rerank"));
        assert!(requests[0].contains(r#""texts":["a","b","c"]"#));
    }

    #[tokio::test]
    async fn test_missing_scores_are_backend_failures() {
        let server =
            StubHttpServer::start(vec![(200, r#"[{"index":0,"score":0.4}]"#.to_string())]).await;
        let reranker = HttpReranker::new(&server.url(), Duration::from_secs(5)).unwrap();

        let err = reranker
            .score("q", &["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_unavailable() {
        let server = StubHttpServer::start(vec![(500, "boom".to_string())]).await;
        let reranker = HttpReranker::new(&server.url(), Duration::from_secs(5)).unwrap();

        let err = reranker.score("q", &["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, AppError::BackendUnavailable(_)));
    }
}
