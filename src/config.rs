//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::analysis::{EnvInfo, OllamaConfig};
use crate::context::ContextConfig;
use crate::encode::EncoderConfig;
use crate::fetch::{FetchConfig, PrometheusConfig};
use crate::index::MilvusConfig;
use crate::series::SegmentConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub prometheus: PrometheusSection,

    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub index: IndexSection,

    #[serde(default)]
    pub analysis: AnalysisSection,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Host (or `host:port`) to environment mapping
    #[serde(default)]
    pub hosts: HashMap<String, EnvInfo>,
}

/// Metrics backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusSection {
    #[serde(default = "default_prometheus_url")]
    pub url: String,

    #[serde(default = "default_query")]
    pub default_query: String,

    #[serde(default = "default_range_step")]
    pub range_step: String,

    #[serde(default = "default_ingest_days")]
    pub ingest_days: i64,

    #[serde(default = "default_max_points")]
    pub max_points_per_request: i64,

    #[serde(default = "default_chunk_concurrency")]
    pub chunk_concurrency: usize,

    #[serde(default = "default_range_timeout")]
    pub range_timeout_secs: u64,

    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,
}

fn default_prometheus_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_query() -> String {
    "up".to_string()
}

fn default_range_step() -> String {
    "60s".to_string()
}

fn default_ingest_days() -> i64 {
    15
}

fn default_max_points() -> i64 {
    10_000
}

fn default_chunk_concurrency() -> usize {
    4
}

fn default_range_timeout() -> u64 {
    60
}

fn default_metadata_timeout() -> u64 {
    15
}

impl Default for PrometheusSection {
    fn default() -> Self {
        Self {
            url: default_prometheus_url(),
            default_query: default_query(),
            range_step: default_range_step(),
            ingest_days: default_ingest_days(),
            max_points_per_request: default_max_points(),
            chunk_concurrency: default_chunk_concurrency(),
            range_timeout_secs: default_range_timeout(),
            metadata_timeout_secs: default_metadata_timeout(),
        }
    }
}

/// Segmentation, encoding and retrieval settings
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_window_seconds")]
    pub window_seconds: i64,

    #[serde(default = "default_min_points")]
    pub min_points: usize,

    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_analyze_hours")]
    pub analyze_hours: i64,
}

fn default_window_seconds() -> i64 {
    3600
}

fn default_min_points() -> usize {
    4
}

fn default_vector_dim() -> usize {
    128
}

fn default_top_k() -> usize {
    3
}

fn default_analyze_hours() -> i64 {
    6
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            min_points: default_min_points(),
            vector_dim: default_vector_dim(),
            top_k: default_top_k(),
            analyze_hours: default_analyze_hours(),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSection {
    /// "memory", "sqlite" or "milvus"
    #[serde(default = "default_index_backend")]
    pub backend: String,

    /// Database file for the sqlite backend
    #[serde(default = "default_index_path")]
    pub path: String,

    #[serde(default = "default_milvus_url")]
    pub milvus_url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default)]
    pub token: String,

    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

fn default_index_backend() -> String {
    "sqlite".to_string()
}

fn default_index_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("precedent").join("segments.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./precedent_data/segments.db".to_string())
}

fn default_milvus_url() -> String {
    "http://localhost:19530".to_string()
}

fn default_collection() -> String {
    "metrics_segments".to_string()
}

fn default_index_timeout() -> u64 {
    30
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            path: default_index_path(),
            milvus_url: default_milvus_url(),
            collection: default_collection(),
            token: String::new(),
            timeout_secs: default_index_timeout(),
        }
    }
}

impl IndexSection {
    /// Database path with a leading `~` expanded
    pub fn resolved_path(&self) -> PathBuf {
        match self.path.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.path)),
            None => PathBuf::from(&self.path),
        }
    }
}

/// Generative analysis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSection {
    #[serde(default = "default_analysis_enabled")]
    pub enabled: bool,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,

    /// Recent points the statistical fallback looks at
    #[serde(default = "default_fallback_tail")]
    pub fallback_tail: usize,
}

fn default_analysis_enabled() -> bool {
    true
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2:latest".to_string()
}

fn default_analysis_timeout() -> u64 {
    300
}

fn default_fallback_tail() -> usize {
    200
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            enabled: default_analysis_enabled(),
            ollama_url: default_ollama_url(),
            model: default_model(),
            timeout_secs: default_analysis_timeout(),
            fallback_tail: default_fallback_tail(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("precedent").join("config.toml")),
            Some(PathBuf::from("/etc/precedent/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Prometheus overrides
        if let Ok(url) = std::env::var("PRECEDENT_PROMETHEUS_URL") {
            self.prometheus.url = url;
        }
        if let Ok(query) = std::env::var("PRECEDENT_DEFAULT_QUERY") {
            self.prometheus.default_query = query;
        }
        if let Ok(step) = std::env::var("PRECEDENT_RANGE_STEP") {
            self.prometheus.range_step = step;
        }
        if let Ok(days) = std::env::var("PRECEDENT_INGEST_DAYS") {
            if let Ok(d) = days.parse() {
                self.prometheus.ingest_days = d;
            }
        }

        // Index overrides
        if let Ok(backend) = std::env::var("PRECEDENT_INDEX_BACKEND") {
            self.index.backend = backend;
        }
        if let Ok(path) = std::env::var("PRECEDENT_INDEX_PATH") {
            self.index.path = path;
        }
        if let Ok(url) = std::env::var("PRECEDENT_MILVUS_URL") {
            self.index.milvus_url = url;
        }

        // Analysis overrides
        if let Ok(url) = std::env::var("PRECEDENT_OLLAMA_URL") {
            self.analysis.ollama_url = url;
        }
        if let Ok(model) = std::env::var("PRECEDENT_OLLAMA_MODEL") {
            self.analysis.model = model;
        }

        // Logging overrides
        if let Ok(level) = std::env::var("PRECEDENT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("PRECEDENT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    pub fn prometheus_config(&self) -> PrometheusConfig {
        PrometheusConfig {
            base_url: self.prometheus.url.clone(),
            range_timeout_secs: self.prometheus.range_timeout_secs,
            metadata_timeout_secs: self.prometheus.metadata_timeout_secs,
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            max_points_per_request: self.prometheus.max_points_per_request,
            chunk_concurrency: self.prometheus.chunk_concurrency,
        }
    }

    pub fn segment_config(&self) -> SegmentConfig {
        SegmentConfig {
            window_seconds: self.pipeline.window_seconds,
            min_points: self.pipeline.min_points,
        }
    }

    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            dim: self.pipeline.vector_dim,
        }
    }

    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            top_k: self.pipeline.top_k,
        }
    }

    pub fn milvus_config(&self) -> MilvusConfig {
        MilvusConfig {
            base_url: self.index.milvus_url.clone(),
            collection: self.index.collection.clone(),
            token: self.index.token.clone(),
            dim: self.pipeline.vector_dim,
            timeout_secs: self.index.timeout_secs,
            ..MilvusConfig::default()
        }
    }

    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig {
            base_url: self.analysis.ollama_url.clone(),
            model: self.analysis.model.clone(),
            timeout_secs: self.analysis.timeout_secs,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Precedent Configuration
#
# Environment variables override these settings:
# - PRECEDENT_PROMETHEUS_URL
# - PRECEDENT_DEFAULT_QUERY
# - PRECEDENT_RANGE_STEP
# - PRECEDENT_INGEST_DAYS
# - PRECEDENT_INDEX_BACKEND
# - PRECEDENT_INDEX_PATH
# - PRECEDENT_MILVUS_URL
# - PRECEDENT_OLLAMA_URL
# - PRECEDENT_OLLAMA_MODEL
# - PRECEDENT_LOG_LEVEL
# - PRECEDENT_LOG_FORMAT

[prometheus]
# Prometheus server URL
url = "http://localhost:9090"

# Query used when none is given on the command line
default_query = "up"

# Range query resolution ("60s", "5m", "1h" or plain seconds)
range_step = "60s"

# How much history `ingest` indexes (days)
ingest_days = 15

# Ranges above this many points are fetched in chunks
max_points_per_request = 10000

# Chunk requests in flight at once
chunk_concurrency = 4

# Request timeouts (seconds)
range_timeout_secs = 60
metadata_timeout_secs = 15

[pipeline]
# Maximum span of one indexed segment (seconds)
window_seconds = 3600

# Segments with fewer points are discarded
min_points = 4

# Feature vector dimension (must match the index collection)
vector_dim = 128

# Similar segments retrieved per analysis
top_k = 3

# How much recent history `analyze` looks at (hours)
analyze_hours = 6

[index]
# Vector index backend: memory, sqlite or milvus
backend = "sqlite"

# Database file for the sqlite backend
path = "~/.local/share/precedent/segments.db"

# Milvus RESTful endpoint and collection
milvus_url = "http://localhost:19530"
collection = "metrics_segments"

# Milvus token ("user:password" or API key), empty for none
token = ""

# Request timeout in seconds
timeout_secs = 30

[analysis]
# Use the generative model; when false only statistics are reported
enabled = true

# Ollama server and model
ollama_url = "http://localhost:11434"
model = "qwen2:latest"

# Generation timeout in seconds
timeout_secs = 300

# Recent points used by the statistical fallback
fallback_tail = 200

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Host to environment mapping, by "host:port" or bare host
# [hosts."10.0.0.1"]
# env = "production"
# service = "orders"
"#
    .to_string()
}
