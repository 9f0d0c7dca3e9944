
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Environment variable naming an optional TOML file applied before the environment.
pub const CONFIG_PATH_ENV: &str = "DOC_QUERY_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub openai: OpenAiConfig,
    pub ollama: OllamaConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8003,
            upload_dir: PathBuf::from("uploaded_files"),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Backing vector store connection. `vector_db` mirrors the `VECTOR_DB` variable and is
/// left unset unless configured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub vector_db: Option<String>,
    pub host: String,
    pub port: u16,
    pub ready_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            vector_db: None,
            host: "doc_redis".to_string(),
            port: 6379,
            ready_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
}

impl StoreConfig {
    /// The selected backend, or `None` when `vector_db` is missing or names an
    /// unsupported store.
    #[inline]
    pub fn backend(&self) -> Option<StoreBackend> {
        match self.vector_db.as_deref().map(str::trim) {
            Some(name) if name.eq_ignore_ascii_case("redis") => Some(StoreBackend::Redis),
            _ => None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.masked_api_key())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl OpenAiConfig {
    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        // Url::join drops the last path segment unless it ends with a slash
        let normalized = format!("{}/", self.base_url.trim_end_matches('/'));
        Url::parse(&normalized).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))
    }

    #[inline]
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_deref().map(|key| {
            let visible = key.get(key.len().saturating_sub(4)..).unwrap_or_default();
            format!("****{}", visible)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.ollama_url()?;
        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Ollama,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::InvalidProvider(other.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => f.write_str("openai"),
            Self::Ollama => f.write_str("ollama"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: Provider,
    /// Falls back to the provider's default embedding model when unset.
    pub model: Option<String>,
    pub batch_size: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: None,
            batch_size: 64,
        }
    }
}

impl EmbeddingConfig {
    #[inline]
    pub fn model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, Provider::OpenAi) => "text-embedding-3-small",
            (None, Provider::Ollama) => "nomic-embed-text:latest",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    /// Falls back to the provider's default chat model when unset.
    pub model: Option<String>,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: None,
            temperature: 0.7,
        }
    }
}

impl LlmConfig {
    #[inline]
    pub fn model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, Provider::OpenAi) => "gpt-3.5-turbo",
            (None, Provider::Ollama) => "llama3.2",
        }
    }
}

/// Character-window settings for the chunker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

/// Where the CLI client sends its requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub backend_host: String,
    pub backend_port: u16,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_host: "doc_backend".to_string(),
            backend_port: 8003,
            timeout_secs: 300,
        }
    }
}

impl ClientConfig {
    #[inline]
    pub fn backend_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("http://{}:{}", self.backend_host, self.backend_port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid provider: {0} (must be 'openai' or 'ollama')")]
    InvalidProvider(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 2048)")]
    InvalidBatchSize(u32),
    #[error("Invalid temperature: {0} (must be between 0 and 2)")]
    InvalidTemperature(f32),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid top-k: {0} (must be at least 1)")]
    InvalidTopK(usize),
    #[error("Missing OpenAI API key (set OPENAI_API_KEY)")]
    MissingApiKey,
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Resolve configuration from defaults, the optional TOML file and the process
    /// environment.
    #[inline]
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with a custom variable lookup.
    #[inline]
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    #[inline]
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("VECTOR_DB") {
            self.store.vector_db = Some(value);
        }
        if let Some(value) = get("REDIS_HOST") {
            self.store.host = value;
        }
        if let Some(value) = get("REDIS_PORT") {
            self.store.port = parse_env("REDIS_PORT", &value)?;
        }
        if let Some(value) = get("STORE_READY_TIMEOUT") {
            self.store.ready_timeout_secs = parse_env("STORE_READY_TIMEOUT", &value)?;
        }
        if let Some(value) = get("SERVER_HOST") {
            self.server.host = value;
        }
        if let Some(value) = get("SERVER_PORT") {
            self.server.port = parse_env("SERVER_PORT", &value)?;
        }
        if let Some(value) = get("UPLOAD_DIR") {
            self.server.upload_dir = PathBuf::from(value);
        }
        if let Some(value) = get("BACKEND_HOST") {
            self.client.backend_host = value;
        }
        if let Some(value) = get("BACKEND_PORT") {
            self.client.backend_port = parse_env("BACKEND_PORT", &value)?;
        }
        if let Some(value) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(value);
        }
        if let Some(value) = get("OPENAI_BASE_URL") {
            self.openai.base_url = value;
        }
        if let Some(value) = get("OLLAMA_URL") {
            let url = Url::parse(&value).map_err(|_| ConfigError::InvalidUrl(value.clone()))?;
            self.ollama.protocol = url.scheme().to_string();
            self.ollama.host = url
                .host_str()
                .ok_or_else(|| ConfigError::InvalidUrl(value.clone()))?
                .to_string();
            self.ollama.port = url.port_or_known_default().unwrap_or(self.ollama.port);
        }
        if let Some(value) = get("EMBEDDING_PROVIDER") {
            self.embedding.provider = value.parse()?;
        }
        if let Some(value) = get("EMBEDDING_MODEL") {
            self.embedding.model = Some(value);
        }
        if let Some(value) = get("LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = get("LLM_MODEL") {
            self.llm.model = Some(value);
        }
        if let Some(value) = get("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_env("CHUNK_SIZE", &value)?;
        }
        if let Some(value) = get("CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_env("CHUNK_OVERLAP", &value)?;
        }
        if let Some(value) = get("RETRIEVAL_TOP_K") {
            self.retrieval.top_k = parse_env("RETRIEVAL_TOP_K", &value)?;
        }

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }
        if self.store.port == 0 {
            return Err(ConfigError::InvalidPort(self.store.port));
        }
        if self.client.backend_port == 0 {
            return Err(ConfigError::InvalidPort(self.client.backend_port));
        }
        self.client.backend_url()?;

        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        if self.embedding.model().trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding.model().to_string()));
        }
        if self.embedding.batch_size == 0 || self.embedding.batch_size > 2048 {
            return Err(ConfigError::InvalidBatchSize(self.embedding.batch_size));
        }
        if self.llm.model().trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.llm.model().to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidTemperature(self.llm.temperature));
        }

        Ok(())
    }

    /// Check the settings of the providers that are actually selected. Only the server
    /// needs these, so loading does not enforce them.
    #[inline]
    pub fn validate_providers(&self) -> Result<(), ConfigError> {
        let providers = [self.embedding.provider, self.llm.provider];
        if providers.contains(&Provider::OpenAi) {
            self.openai.base_url()?;
            if self
                .openai
                .api_key
                .as_deref()
                .is_none_or(|key| key.trim().is_empty())
            {
                return Err(ConfigError::MissingApiKey);
            }
        }
        if providers.contains(&Provider::Ollama) {
            self.ollama.validate()?;
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}
