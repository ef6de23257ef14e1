//! Serve command handler.
//!
//! Exposes the assistant over HTTP. Answers stream as Server-Sent Events
//! whose event names and payloads mirror [`StreamEvent`].

use super::ingest_paths;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::get,
    Router,
};
use clap::Args;
use futures::{Stream, StreamExt};
use pagecite_core::{config::AppConfig, AppError, AppResult};
use pagecite_knowledge::{Assistant, CorpusStats, DocumentRecord, PageText, StreamEvent};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Serve the streaming chat API
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Document or directory to ingest at startup (.txt, .md); repeatable
    #[arg(short, long = "doc")]
    pub docs: Vec<PathBuf>,

    /// Address to listen on (overrides server.bind)
    #[arg(long)]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing serve command");

        let assistant = Arc::new(Assistant::from_config(config)?);
        if !self.docs.is_empty() {
            let chunks = ingest_paths(&assistant, &self.docs).await?;
            tracing::info!(chunks, "Startup documents ready");
        }

        let app = router(assistant, &config.server.allowed_origin)?;
        let bind = self.bind.as_deref().unwrap_or(&config.server.bind);
        let listener = tokio::net::TcpListener::bind(bind).await?;

        tracing::info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
}

/// Build the HTTP surface over `assistant`.
pub fn router(assistant: Arc<Assistant>, allowed_origin: &str) -> AppResult<Router> {
    let origin = HeaderValue::from_str(allowed_origin).map_err(|e| {
        AppError::Config(format!("Invalid allowed origin {:?}: {}", allowed_origin, e))
    })?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/health", get(health))
        .route("/chat/stream", get(chat_stream))
        .route(
            "/documents",
            get(list_documents)
                .post(upload_document)
                .delete(reset_documents),
        )
        .route(
            "/documents/:name",
            get(document_pages).delete(remove_document),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { assistant }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct ChatParams {
    #[serde(default)]
    query: String,
}

async fn chat_stream(
    State(state): State<AppState>,
    Query(params): Query<ChatParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state
        .assistant
        .ask(params.query)
        .map(|event| Ok(to_sse(&event)));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// SSE framing of one stream event. Carriage returns cannot travel in SSE
/// data fields, so they are folded into newlines.
fn to_sse(event: &StreamEvent) -> Event {
    let payload = event.payload().replace("\r\n", "\n").replace('\r', "\n");
    Event::default().event(event.name()).data(payload)
}

#[derive(Debug, Serialize)]
struct DocumentList {
    documents: Vec<DocumentRecord>,
    stats: CorpusStats,
}

async fn list_documents(State(state): State<AppState>) -> Json<DocumentList> {
    let corpus = state.assistant.corpus();
    Json(DocumentList {
        documents: corpus.documents().await,
        stats: corpus.stats().await,
    })
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    name: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    document: String,
    chunks: usize,
}

async fn upload_document(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    let chunks = state
        .assistant
        .corpus()
        .upload_text(&request.name, &request.text)
        .await?;
    Ok(Json(UploadResponse {
        document: request.name.trim().to_string(),
        chunks,
    }))
}

async fn reset_documents(State(state): State<AppState>) -> StatusCode {
    state.assistant.corpus().reset_all().await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct PageParams {
    page: Option<u32>,
}

#[derive(Debug, Serialize)]
struct DocumentPages {
    document: String,
    pages: Vec<PageText>,
}

/// Stored text of one document, or of a single page with `?page=N`.
async fn document_pages(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<DocumentPages>, ApiError> {
    let mut pages = state.assistant.corpus().pages(&name).await?;
    if let Some(number) = params.page {
        pages.retain(|p| p.page == number);
        if pages.is_empty() {
            return Err(AppError::DocumentNotFound(format!("{} page {}", name, number)).into());
        }
    }
    Ok(Json(DocumentPages {
        document: name,
        pages,
    }))
}

async fn remove_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chunks = state.assistant.corpus().remove(&name).await?;
    Ok(Json(serde_json::json!({ "document": name, "chunks": chunks })))
}

/// Error response wrapper
struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Knowledge(_) | AppError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        AppError::EmptyDocument(_) | AppError::EmptyCorpus => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
        AppError::NotInitialized => StatusCode::CONFLICT,
        AppError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), "Request failed: {}", self.0);
        } else {
            tracing::warn!(kind = self.0.kind(), "Request rejected: {}", self.0);
        }

        let body = serde_json::json!({
            "error": {
                "kind": self.0.kind(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
