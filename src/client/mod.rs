// Client module
// Talks to a running service over HTTP on behalf of the CLI

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::pipeline::Answer;
use crate::server::routes::{UPLOAD_FIELD, UploadResponse};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Blocking HTTP client for the service. Build and use it off the async workers.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: Url,
    http: Client,
}

impl BackendClient {
    #[inline]
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config
            .backend_url()
            .context("Failed to build backend URL from config")?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { base_url, http })
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send `paths` as one upload and return the service's status message.
    #[inline]
    pub fn upload(&self, paths: &[PathBuf]) -> Result<String> {
        let mut form = Form::new();
        for path in paths {
            form = form.part(UPLOAD_FIELD, file_part(path)?);
        }

        let url = self
            .base_url
            .join("upload/")
            .context("Failed to build upload URL")?;
        debug!("Uploading {} file(s) to {}", paths.len(), url);

        let response = self
            .http
            .post(url.as_str())
            .multipart(form)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        let reply: UploadResponse = read_reply(response, &url)?;
        Ok(reply.status)
    }

    #[inline]
    pub fn ask(&self, question: &str) -> Result<Answer> {
        let url = self
            .base_url
            .join("query/")
            .context("Failed to build query URL")?;

        let response = self
            .http
            .post(url.as_str())
            .json(&json!({ "question": question }))
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        read_reply(response, &url)
    }
}

/// One `files` part: the file's bytes under its base name, typed by extension.
fn file_part(path: &Path) -> Result<Part> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .with_context(|| format!("{} has no file name", path.display()))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Part::bytes(bytes)
        .file_name(filename)
        .mime_str(mime.essence_str())
        .with_context(|| format!("Invalid content type for {}", path.display()))
}

/// Decode a success body, or turn the service's `{"error": ...}` body into an error.
fn read_reply<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T> {
    let status = response.status();
    let text = response
        .text()
        .with_context(|| format!("Failed to read response from {}", url))?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        anyhow::bail!("{} (HTTP {})", message.trim(), status.as_u16());
    }

    serde_json::from_str(&text).with_context(|| format!("Failed to parse response from {}", url))
}
