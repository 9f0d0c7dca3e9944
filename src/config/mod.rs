// Configuration management module
// Defaults, optional TOML file and environment overrides

pub mod settings;

pub use settings::{
    CONFIG_PATH_ENV, ChunkingConfig, ClientConfig, Config, ConfigError, EmbeddingConfig,
    LlmConfig, OllamaConfig, OpenAiConfig, Provider, RetrievalConfig, ServerConfig,
    StoreBackend, StoreConfig,
};
