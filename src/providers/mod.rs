// Providers module
// Embedding and language model clients for OpenAI-compatible and Ollama endpoints

pub mod ollama;
pub mod openai;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::{Config, Provider};

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Turns text into embedding vectors. Calls block on network I/O.
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])?
            .pop()
            .context("Embedding provider returned no vector for the query")
    }
}

/// Completes a prompt. Calls block on network I/O.
pub trait ChatModel: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

#[inline]
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    Ok(match config.embedding.provider {
        Provider::OpenAi => Arc::new(OpenAiClient::for_embeddings(
            &config.openai,
            &config.embedding,
        )?),
        Provider::Ollama => Arc::new(OllamaClient::for_embeddings(
            &config.ollama,
            &config.embedding,
        )?),
    })
}

#[inline]
pub fn build_chat_model(config: &Config) -> Result<Arc<dyn ChatModel>> {
    Ok(match config.llm.provider {
        Provider::OpenAi => Arc::new(OpenAiClient::for_chat(&config.openai, &config.llm)?),
        Provider::Ollama => Arc::new(OllamaClient::for_chat(&config.ollama, &config.llm)?),
    })
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// POST a JSON body and decode the JSON reply. Non-2xx statuses become errors carrying
/// the response body. Nothing is retried.
fn post_json<B, R>(
    agent: &ureq::Agent,
    url: &Url,
    bearer: Option<&str>,
    body: &B,
) -> Result<R>
where
    B: Serialize,
    R: DeserializeOwned,
{
    let request_json = serde_json::to_string(body).context("Failed to serialize request")?;

    let mut request = agent
        .post(url.as_str())
        .header("Content-Type", "application/json");
    if let Some(token) = bearer {
        request = request.header("Authorization", format!("Bearer {}", token.trim()));
    }

    debug!("POST {}", url);
    let mut response = request
        .send(request_json.as_str())
        .with_context(|| format!("Request to {} failed", url))?;

    let status = response.status();
    let response_text = response
        .body_mut()
        .read_to_string()
        .with_context(|| format!("Failed to read response from {}", url))?;

    if !status.is_success() {
        anyhow::bail!("{} returned HTTP {}: {}", url, status.as_u16(), response_text.trim());
    }

    serde_json::from_str(&response_text)
        .with_context(|| format!("Failed to parse response from {}", url))
}
