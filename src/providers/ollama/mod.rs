
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{ChatModel, Embedder, build_agent, post_json};
use crate::config::{EmbeddingConfig, LlmConfig, OllamaConfig};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    temperature: f32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    fn new(config: &OllamaConfig, model: &str) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            model: model.to_string(),
            batch_size: 64,
            temperature: 0.7,
            agent: build_agent(Duration::from_secs(config.timeout_secs)),
        })
    }

    #[inline]
    pub fn for_embeddings(config: &OllamaConfig, embedding: &EmbeddingConfig) -> Result<Self> {
        let mut client = Self::new(config, embedding.model())?;
        client.batch_size = embedding.batch_size.max(1);
        Ok(client)
    }

    #[inline]
    pub fn for_chat(config: &OllamaConfig, llm: &LlmConfig) -> Result<Self> {
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
            .join("/api/embed")
            .context("Failed to build batch embedding URL")?;

        let request = BatchEmbedRequest {
            model: &self.model,
            inputs: texts,
        };
        let response: BatchEmbedResponse = post_json(&self.agent, &url, None, &request)
            .context("Failed to generate batch embeddings")?;

        if response.embeddings.len() != texts.len() {
            anyhow::bail!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            );
        }

        Ok(response.embeddings)
    }
}

impl Embedder for OllamaClient {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        // Process in batches to avoid overwhelming the server
        for batch in texts.chunks(self.batch_size as usize) {
            let batch_vectors = self
                .embed_batch(batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;
            vectors.extend(batch_vectors);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }
}

impl ChatModel for OllamaClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        let url = self
            .base_url
            .join("/api/generate")
            .context("Failed to build generate URL")?;

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response: GenerateResponse = post_json(&self.agent, &url, None, &request)
            .context("Failed to generate completion")?;
        Ok(response.response)
    }
}
