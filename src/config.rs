//! Application configuration.
//!
//! One immutable [`AppConfig`] is built at process start and passed by
//! reference into the moderation gate, the orchestrator and the tool
//! adapters. Tuning values come from an optional YAML file (with `${VAR}`
//! and `${VAR:-default}` interpolation); credentials come from the
//! environment. A missing credential is a fatal startup error.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "SELLERSIGHT_CONFIG";

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const PINECONE_API_KEY_ENV: &str = "PINECONE_API_KEY";
pub const PINECONE_INDEX_NAME_ENV: &str = "PINECONE_INDEX_NAME";
pub const PINECONE_INDEX_HOST_ENV: &str = "PINECONE_INDEX_HOST";
pub const EXA_API_KEY_ENV: &str = "EXA_API_KEY";

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("required environment variable {var} is not set")]
    MissingCredential { var: &'static str },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ─── Sections ────────────────────────────────────────────────────────────────

/// Top-level configuration (mirrors the optional `config.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub completion: CompletionConfig,
    pub moderation: ModerationConfig,
    pub review_index: ReviewIndexConfig,
    pub web_search: WebSearchConfig,
    pub orchestration: OrchestrationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `0.0.0.0:3000`.
    pub bind_addr: String,
    /// Allow any origin (the browser client may be served elsewhere).
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            cors_permissive: true,
        }
    }
}

/// Completion engine (OpenAI-compatible) settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    /// Always taken from `OPENAI_API_KEY`.
    #[serde(skip)]
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub connect_timeout_secs: u64,
    pub stream_timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4.1-mini".to_string(),
            temperature: 0.3,
            max_tokens: 2048,
            connect_timeout_secs: 5,
            stream_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Moderation endpoint base; shares the completion credential.
    pub base_url: String,
    pub model: String,
    /// When `true`, a classifier failure lets the request through.
    pub fail_open: bool,
    pub timeout_secs: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "omni-moderation-latest".to_string(),
            fail_open: false,
            timeout_secs: 10,
        }
    }
}

/// Vector index (Pinecone) holding embedded review chunks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewIndexConfig {
    #[serde(skip)]
    pub api_key: String,
    #[serde(skip)]
    pub index_name: String,
    /// Data-plane host; resolved from the control plane when absent.
    #[serde(skip)]
    pub index_host: Option<String>,
    pub control_plane_url: String,
    pub namespace: Option<String>,
    pub embedding_model: String,
    pub default_top_k: u32,
    /// Passages scoring below this are treated as irrelevant.
    pub min_score: f32,
    pub timeout_secs: u64,
}

impl Default for ReviewIndexConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            index_name: String::new(),
            index_host: None,
            control_plane_url: "https://api.pinecone.io".to_string(),
            namespace: None,
            embedding_model: "text-embedding-3-small".to_string(),
            default_top_k: 8,
            min_score: 0.3,
            timeout_secs: 15,
        }
    }
}

/// Web search provider (Exa).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    #[serde(skip)]
    pub api_key: String,
    pub base_url: String,
    pub default_num_results: u32,
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.exa.ai".to_string(),
            default_num_results: 5,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Maximum model-decision rounds per request.
    pub step_budget: u32,
    /// Wall-clock ceiling for one chat request.
    pub request_timeout_secs: u64,
    /// Capacity of the per-request event queue.
    pub event_buffer: usize,
    /// Cap on tool result text fed back to the model.
    pub max_tool_result_chars: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            step_budget: 20,
            request_timeout_secs: 60,
            event_buffer: 64,
            max_tool_result_chars: 6_000,
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration for the running process.
    ///
    /// 1. Parse the config file if one is found (see [`find_config_path`]).
    /// 2. Overlay credentials from the environment.
    /// 3. Validate.
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |name: &str| std::env::var(name).ok();

        let mut config = match find_config_path(lookup(CONFIG_PATH_ENV)) {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading config file");
                Self::from_file(&path, &lookup)?
            }
            None => Self::default(),
        };

        config.apply_env(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML config file after env-var interpolation.
    pub fn from_file(
        path: &Path,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&raw, lookup)
    }

    pub fn from_yaml(
        raw: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(raw, lookup);
        if interpolated.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Overlay credentials from the environment. Blank values count as unset.
    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get(OPENAI_API_KEY_ENV) {
            self.completion.api_key = key;
        }
        if let Some(key) = get(PINECONE_API_KEY_ENV) {
            self.review_index.api_key = key;
        }
        if let Some(name) = get(PINECONE_INDEX_NAME_ENV) {
            self.review_index.index_name = name;
        }
        if let Some(host) = get(PINECONE_INDEX_HOST_ENV) {
            self.review_index.index_host = Some(host);
        }
        if let Some(key) = get(EXA_API_KEY_ENV) {
            self.web_search.api_key = key;
        }
    }

    /// Check required credentials and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, &str); 4] = [
            (OPENAI_API_KEY_ENV, &self.completion.api_key),
            (PINECONE_API_KEY_ENV, &self.review_index.api_key),
            (PINECONE_INDEX_NAME_ENV, &self.review_index.index_name),
            (EXA_API_KEY_ENV, &self.web_search.api_key),
        ];
        for (var, value) in required {
            if value.is_empty() {
                return Err(ConfigError::MissingCredential { var });
            }
        }

        if self.orchestration.step_budget == 0 {
            return Err(ConfigError::Invalid {
                field: "orchestration.step_budget",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.orchestration.event_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "orchestration.event_buffer",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.review_index.min_score) {
            return Err(ConfigError::Invalid {
                field: "review_index.min_score",
                reason: format!("{} is outside [0, 1]", self.review_index.min_score),
            });
        }
        Ok(())
    }
}

/// Resolve the config file path.
///
/// An explicit `SELLERSIGHT_CONFIG` wins; otherwise
/// `<config_dir>/sellersight/config.yaml` is used if it exists. No file is
/// fine: every section has defaults.
pub fn find_config_path(explicit: Option<String>) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("sellersight").join("config.yaml"))
        .filter(|candidate| candidate.exists())
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let expr = &after[..end];
                let (name, default) = match expr.split_once(":-") {
                    Some((name, default)) => (name, Some(default)),
                    None => (expr, None),
                };
                let value = lookup(name).or_else(|| default.map(String::from));
                result.push_str(&value.unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated: keep the text as written.
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

// ─── Tests ───────────────────────────────────────────────────────────────────
