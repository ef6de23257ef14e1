//! Configuration management for pagecite.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`.pagecite/config.yaml` in the workspace, or `PAGECITE_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Nothing about the index itself is persisted; the workspace only holds
//! configuration and optional prompt overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Embedding providers known to the factory.
pub const EMBEDDING_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Reranker providers known to the factory.
pub const RERANKER_PROVIDERS: [&str; 2] = ["lexical", "http"];

/// Upper bound on citation snippet length, in characters.
pub const MAX_SNIPPET_CHARS: usize = 160;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .pagecite/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit JSON log lines
    pub json_logs: bool,

    pub generation: GenerationSettings,
    pub embedding: EmbeddingSettings,
    pub reranker: RerankerSettings,
    pub retrieval: RetrievalSettings,
    pub server: ServerSettings,
}

/// Generative backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    pub endpoint: String,
    pub model: String,
    pub connect_timeout_secs: u64,
    /// Longest silence tolerated between two streamed tokens
    pub token_timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            connect_timeout_secs: 10,
            token_timeout_secs: 60,
            temperature: 0.2,
            max_tokens: None,
        }
    }
}

/// Embedding backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// "trigram" or "ollama"
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    /// Output dimension of the trigram provider
    pub dimensions: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "nomic-embed-text".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            dimensions: 384,
            batch_size: 64,
            timeout_secs: 30,
        }
    }
}

/// Reranker backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RerankerSettings {
    /// "lexical" or "http"
    pub provider: String,
    /// Base URL of a `/rerank` service (http provider only)
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self {
            provider: "lexical".to_string(),
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

/// Chunking, ranking and answer-shaping parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Candidates pulled from the vector index before reranking
    pub recall_k: usize,
    /// Results kept after reranking
    pub top_k: usize,
    pub snippet_chars: usize,
    pub max_context_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: 400,
            chunk_overlap: 50,
            recall_k: 10,
            top_k: 3,
            snippet_chars: 160,
            max_context_chars: 6000,
        }
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub bind: String,
    pub allowed_origin: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            allowed_origin: "http://localhost:3000".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    generation: Option<GenerationSettings>,
    embedding: Option<EmbeddingSettings>,
    reranker: Option<RerankerSettings>,
    retrieval: Option<RetrievalSettings>,
    server: Option<ServerSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
            generation: GenerationSettings::default(),
            embedding: EmbeddingSettings::default(),
            reranker: RerankerSettings::default(),
            retrieval: RetrievalSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `PAGECITE_WORKSPACE`: Override workspace path
    /// - `PAGECITE_CONFIG`: Path to config file
    /// - `PAGECITE_MODEL`: Generation model identifier
    /// - `OLLAMA_URL`: Ollama endpoint for generation and embeddings
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_in(None)
    }

    /// Like [`AppConfig::load`], but reads the config file of `workspace`
    /// when given instead of the environment's workspace.
    pub fn load_in(workspace: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        } else if let Ok(workspace) = std::env::var("PAGECITE_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("PAGECITE_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.pagecite_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(model) = std::env::var("PAGECITE_MODEL") {
            config.generation.model = model;
        }

        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.generation.endpoint = url.clone();
            config.embedding.endpoint = url;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents).map_err(|e| match e {
            AppError::Serialization(msg) => {
                AppError::Config(format!("Failed to parse config file {:?}: {}", path, msg))
            }
            other => other,
        })
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(contents)?
        };

        let mut result = self.clone();

        if let Some(generation) = file.generation {
            result.generation = generation;
        }
        if let Some(embedding) = file.embedding {
            result.embedding = embedding;
        }
        if let Some(reranker) = file.reranker {
            result.reranker = reranker;
        }
        if let Some(retrieval) = file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(server) = file.server {
            result.server = server;
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and
    /// the config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(model) = model {
            self.generation.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .pagecite directory.
    pub fn pagecite_dir(&self) -> PathBuf {
        self.workspace.join(".pagecite")
    }

    /// Validate provider names and retrieval parameters.
    pub fn validate(&self) -> AppResult<()> {
        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if !RERANKER_PROVIDERS.contains(&self.reranker.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown reranker provider: {}. Supported: {}",
                self.reranker.provider,
                RERANKER_PROVIDERS.join(", ")
            )));
        }

        if self.reranker.provider == "http" && self.reranker.endpoint.is_none() {
            return Err(AppError::Config(
                "Reranker provider 'http' requires reranker.endpoint".to_string(),
            ));
        }

        let retrieval = &self.retrieval;
        if retrieval.chunk_size == 0 || retrieval.chunk_overlap >= retrieval.chunk_size {
            return Err(AppError::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                retrieval.chunk_overlap, retrieval.chunk_size
            )));
        }

        if retrieval.top_k == 0 || retrieval.recall_k == 0 {
            return Err(AppError::Config(
                "retrieval.topK and retrieval.recallK must be positive".to_string(),
            ));
        }

        if retrieval.top_k > retrieval.recall_k {
            return Err(AppError::Config(format!(
                "retrieval.topK ({}) cannot exceed retrieval.recallK ({})",
                retrieval.top_k, retrieval.recall_k
            )));
        }

        if retrieval.snippet_chars == 0 || retrieval.snippet_chars > MAX_SNIPPET_CHARS {
            return Err(AppError::InvalidConfig(format!(
                "retrieval.snippetChars ({}) must be between 1 and {}",
                retrieval.snippet_chars, MAX_SNIPPET_CHARS
            )));
        }

        if self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "embedding.batchSize must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
