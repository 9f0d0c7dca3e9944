use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::client::BackendClient;
use crate::config::{Config, StoreBackend};
use crate::index::IndexClient;
use crate::providers::{build_chat_model, build_embedder};
use crate::server;
use crate::service::DocumentService;
use crate::store::{RedisStore, wait_for_redis};

/// Run the HTTP service. Blocks until the store is reachable first; an unreachable store
/// ends the process.
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    config
        .validate_providers()
        .context("Provider configuration is incomplete")?;
    let model = build_chat_model(config).context("Failed to create language model client")?;

    let index = match config.store.backend() {
        Some(StoreBackend::Redis) => {
            let host = config.store.host.clone();
            let port = config.store.port;
            let timeout = config.store.ready_timeout_secs;
            let (client, connection) =
                tokio::task::spawn_blocking(move || wait_for_redis(&host, port, timeout))
                    .await
                    .context("Readiness wait was interrupted")?;

            let embedder = build_embedder(config).context("Failed to create embedding client")?;
            let store = Arc::new(RedisStore::new(client, Some(connection)));
            Some(IndexClient::new(embedder, store))
        }
        None => {
            error!(
                "CRITICAL: Vector database {} not supported.",
                config.store.vector_db.as_deref().unwrap_or("<unset>")
            );
            None
        }
    };

    let service = Arc::new(DocumentService::new(config, index, model));
    info!(
        "Serving documents from {} on {}:{}",
        config.server.upload_dir.display(),
        config.server.host,
        config.server.port
    );
    server::serve(&config.server, service).await?;
    Ok(())
}

/// Send files to a running service.
#[inline]
pub async fn upload_files(config: &Config, files: Vec<PathBuf>) -> Result<()> {
    let backend = config
        .client
        .backend_url()
        .context("Invalid backend address")?;
    println!(
        "Uploading {} file(s) to {}",
        style(files.len()).cyan(),
        style(backend).dim()
    );

    let client_config = config.client.clone();
    let status =
        tokio::task::spawn_blocking(move || BackendClient::new(&client_config)?.upload(&files))
            .await
            .context("Upload task failed")?
            .context("Upload failed")?;

    println!("{}", style(status).green());
    Ok(())
}

/// Ask a running service a question and print its answer.
#[inline]
pub async fn ask(config: &Config, question: String) -> Result<()> {
    let client_config = config.client.clone();
    let answer =
        tokio::task::spawn_blocking(move || BackendClient::new(&client_config)?.ask(&question))
            .await
            .context("Query task failed")?
            .context("Query failed")?;

    println!("{}", style("Answer:").bold().cyan());
    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("{} {}", style("Sources:").bold().yellow(), answer.sources);
    }
    Ok(())
}

/// Print the resolved configuration with secrets masked.
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", style("📋 Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Server:").bold().yellow());
    println!(
        "  Listen: {}",
        style(format!("{}:{}", config.server.host, config.server.port)).cyan()
    );
    println!(
        "  Upload Dir: {}",
        style(config.server.upload_dir.display()).cyan()
    );

    println!("{}", style("Vector Store:").bold().yellow());
    match (config.store.backend(), config.store.vector_db.as_deref()) {
        (Some(_), Some(name)) => println!("  Backend: {}", style(name).cyan()),
        (None, Some(name)) => println!("  Backend: {} (unsupported)", style(name).red()),
        (_, None) => println!("  Backend: {}", style("not set").red()),
    }
    println!(
        "  Address: {}",
        style(format!("{}:{}", config.store.host, config.store.port)).cyan()
    );
    println!(
        "  Ready Timeout: {}s",
        style(config.store.ready_timeout_secs).cyan()
    );

    println!("{}", style("Models:").bold().yellow());
    println!(
        "  Embeddings: {} ({})",
        style(config.embedding.model()).cyan(),
        config.embedding.provider
    );
    println!(
        "  Language Model: {} ({}, temperature {})",
        style(config.llm.model()).cyan(),
        config.llm.provider,
        config.llm.temperature
    );
    println!("  OpenAI URL: {}", style(&config.openai.base_url).cyan());
    match config.openai.masked_api_key() {
        Some(key) => println!("  OpenAI Key: {}", style(key).cyan()),
        None => println!("  OpenAI Key: {}", style("not set").dim()),
    }
    match config.ollama.ollama_url() {
        Ok(url) => println!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => println!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    println!("{}", style("Ingest:").bold().yellow());
    println!(
        "  Chunks: {} chars, {} overlap",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    println!("  Top K: {}", style(config.retrieval.top_k).cyan());

    println!("{}", style("Client:").bold().yellow());
    let backend = config
        .client
        .backend_url()
        .context("Invalid backend address")?;
    println!("  Backend: {}", style(backend).cyan());

    Ok(())
}
