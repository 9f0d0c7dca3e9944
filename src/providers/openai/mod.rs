
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{ChatModel, Embedder, build_agent, post_json};
use crate::config::{ConfigError, EmbeddingConfig, LlmConfig, OpenAiConfig};

/// Client for OpenAI-compatible `/embeddings` and `/chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    model: String,
    batch_size: u32,
    temperature: f32,
    agent: ureq::Agent,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("batch_size", &self.batch_size)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

impl OpenAiClient {
    fn new(config: &OpenAiConfig, model: &str) -> Result<Self> {
        let base_url = config
            .base_url()
            .context("Failed to build OpenAI base URL from config")?;
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            base_url,
            api_key,
            model: model.to_string(),
            batch_size: 64,
            temperature: 0.7,
            agent: build_agent(Duration::from_secs(config.timeout_secs)),
        })
    }

    #[inline]
    pub fn for_embeddings(config: &OpenAiConfig, embedding: &EmbeddingConfig) -> Result<Self> {
        let mut client = Self::new(config, embedding.model())?;
        client.batch_size = embedding.batch_size.max(1);
        Ok(client)
    }

    #[inline]
    pub fn for_chat(config: &OpenAiConfig, llm: &LlmConfig) -> Result<Self> {
        let mut client = Self::new(config, llm.model())?;
        client.temperature = llm.temperature;
        Ok(client)
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("embeddings")
            .context("Failed to build embeddings URL")?;

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let mut response: EmbeddingResponse =
            post_json(&self.agent, &url, Some(&self.api_key), &request)
                .context("Failed to generate embeddings")?;

        if response.data.len() != texts.len() {
            anyhow::bail!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            );
        }

        response.data.sort_by_key(|entry| entry.index);
        Ok(response.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

impl Embedder for OpenAiClient {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Generating embeddings for {} texts with {}",
            texts.len(),
            self.model
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            let batch_vectors = self
                .embed_batch(batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;
            vectors.extend(batch_vectors);
        }

        Ok(vectors)
    }
}

impl ChatModel for OpenAiClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        let url = self
            .base_url
            .join("chat/completions")
            .context("Failed to build chat completions URL")?;

        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(
            "Requesting completion from {} ({} prompt chars)",
            self.model,
            prompt.len()
        );
        let response: ChatResponse = post_json(&self.agent, &url, Some(&self.api_key), &request)
            .context("Failed to generate completion")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Completion response contained no message")
    }
}
