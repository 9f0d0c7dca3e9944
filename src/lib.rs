use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocQueryError>;

#[derive(Error, Debug)]
pub enum DocQueryError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{target} did not become ready within {timeout_secs}s")]
    StartupTimeout { target: String, timeout_secs: u64 },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Failed to load '{file}': {message}")]
    Load { file: String, message: String },

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("No documents have been uploaded yet.")]
    NoPipelineBound,

    #[error("No supported documents with text content were found in the upload.")]
    EmptyUpload,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl DocQueryError {
    /// Wrap a provider or store failure, keeping the whole context chain in the message.
    #[inline]
    pub fn dependency(err: &anyhow::Error) -> Self {
        Self::DependencyUnavailable(format!("{:#}", err))
    }
}

pub mod client;
pub mod commands;
pub mod config;
pub mod index;
pub mod ingest;
pub mod pipeline;
pub mod providers;
pub mod server;
pub mod service;
pub mod store;
