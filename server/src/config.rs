//! Configuration for the query service.

use std::path::PathBuf;
use std::time::Duration;

use pr_context_corpus::DEFAULT_TOP_K;
use pr_context_embeddings::OpenAIProvider;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable naming the corpus file.
pub const CORPUS_ENV_VAR: &str = "PR_CONTEXT_CORPUS";
/// Environment variable for the HTTP listen address.
pub const BIND_ADDR_ENV_VAR: &str = "PR_CONTEXT_BIND_ADDR";
/// Environment variable for the number of results per query.
pub const TOP_K_ENV_VAR: &str = "PR_CONTEXT_TOP_K";
/// Environment variable for the embedding API key.
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
/// Environment variable for the embedding API base URL.
pub const BASE_URL_ENV_VAR: &str = "OPENAI_BASE_URL";
/// Environment variable for the embedding model.
pub const MODEL_ENV_VAR: &str = "PR_CONTEXT_EMBEDDING_MODEL";
/// Environment variable for the embedding call timeout, in seconds.
pub const TIMEOUT_ENV_VAR: &str = "PR_CONTEXT_EMBED_TIMEOUT_SECS";

/// Configuration for the query service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// NDJSON corpus loaded at startup.
    pub corpus_path: PathBuf,

    /// Listen address of the HTTP binding.
    pub bind_addr: String,

    /// Maximum number of similar PRs returned per query.
    pub top_k: usize,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("prs.jsonl"),
            bind_addr: "127.0.0.1:8787".to_string(),
            top_k: DEFAULT_TOP_K,
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`. Empty values are ignored;
    /// unparseable numbers keep the default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = get(CORPUS_ENV_VAR) {
            config.corpus_path = PathBuf::from(path);
        }
        if let Some(addr) = get(BIND_ADDR_ENV_VAR) {
            config.bind_addr = addr;
        }
        if let Some(top_k) = get(TOP_K_ENV_VAR) {
            match top_k.trim().parse() {
                Ok(top_k) => config.top_k = top_k,
                Err(_) => warn!("Ignoring {TOP_K_ENV_VAR}={top_k:?}: not a number"),
            }
        }
        if let Some(key) = get(API_KEY_ENV_VAR) {
            config.embedding.api_key = Some(key);
        }
        if let Some(base_url) = get(BASE_URL_ENV_VAR) {
            config.embedding.base_url = base_url;
        }
        if let Some(model) = get(MODEL_ENV_VAR) {
            config.embedding.model = model;
        }
        if let Some(secs) = get(TIMEOUT_ENV_VAR) {
            match secs.trim().parse() {
                Ok(secs) => config.embedding.timeout_secs = secs,
                Err(_) => warn!("Ignoring {TIMEOUT_ENV_VAR}={secs:?}: not a number"),
            }
        }

        config
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// API base URL.
    pub base_url: String,

    /// Model to use for query embeddings. Must match the corpus model.
    pub model: String,

    /// API key; `None` leaves the provider unconfigured.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Upper bound on a single embedding call.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the provider described by this configuration.
    pub fn provider(&self) -> OpenAIProvider {
        let provider = OpenAIProvider::new()
            .with_base_url(self.base_url.as_str())
            .with_model(self.model.as_str());
        match &self.api_key {
            Some(key) => provider.with_api_key(key.as_str()),
            None => provider,
        }
    }
}
