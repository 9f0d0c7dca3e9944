// Service module
// Upload and query operations shared by the HTTP layer

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{ChunkingConfig, Config};
use crate::index::IndexClient;
use crate::ingest::{self, UploadedFile};
use crate::pipeline::{Answer, Pipeline, PipelineSlot};
use crate::providers::ChatModel;
use crate::store::Collection;
use crate::{DocQueryError, Result};

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub files: usize,
    /// Files ignored because of their type
    pub skipped: Vec<String>,
    pub chunks: usize,
    pub collection: String,
}

/// Owns the current pipeline binding and the ingest settings.
pub struct DocumentService {
    upload_dir: PathBuf,
    chunking: ChunkingConfig,
    top_k: usize,
    index: Option<Arc<IndexClient>>,
    model: Arc<dyn ChatModel>,
    slot: PipelineSlot,
    // Uploads run one at a time
    upload_lock: Mutex<()>,
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("upload_dir", &self.upload_dir)
            .field("chunking", &self.chunking)
            .field("top_k", &self.top_k)
            .field("has_store", &self.index.is_some())
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl DocumentService {
    /// `index` is `None` when no supported vector store is configured; uploads then fail
    /// with [`DocQueryError::DependencyUnavailable`].
    #[inline]
    pub fn new(config: &Config, index: Option<IndexClient>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            upload_dir: config.server.upload_dir.clone(),
            chunking: config.chunking,
            top_k: config.retrieval.top_k,
            index: index.map(Arc::new),
            model,
            slot: PipelineSlot::new(),
            upload_lock: Mutex::new(()),
        }
    }

    #[inline]
    pub fn has_store(&self) -> bool {
        self.index.is_some()
    }

    /// True once an upload has succeeded.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.slot.is_bound()
    }

    /// Save, load, chunk and index `files`, then bind a fresh pipeline to the result.
    ///
    /// Files of unsupported types are skipped. Any other failure leaves the current
    /// binding untouched.
    #[inline]
    pub async fn upload(&self, files: Vec<UploadedFile>) -> Result<UploadSummary> {
        let _guard = self.upload_lock.lock().await;

        let index = self.index.clone().ok_or_else(|| {
            DocQueryError::DependencyUnavailable("No supported vector store is configured".into())
        })?;
        if files.is_empty() {
            return Err(DocQueryError::EmptyUpload);
        }

        // Each file is loaded before the next is written, since equal names share a path
        let mut pages = Vec::new();
        let mut skipped = Vec::new();
        for file in &files {
            let path = file.persist(&self.upload_dir).await?;
            info!("Saved upload {} to {}", file.filename, path.display());

            let extension = file.extension();
            match run_blocking(move || ingest::load(&path, &extension)).await {
                Ok(loaded) => pages.extend(loaded),
                Err(DocQueryError::UnsupportedFileType(name)) => {
                    warn!("Skipping unsupported file {}", name);
                    skipped.push(name);
                }
                Err(e) => return Err(e),
            }
        }

        let chunks = ingest::split(&pages, &self.chunking)?;
        if chunks.is_empty() {
            return Err(DocQueryError::EmptyUpload);
        }
        let chunk_count = chunks.len();

        let collection = Collection::generate();
        let (indexer, target) = (Arc::clone(&index), collection.clone());
        run_blocking(move || indexer.index(&chunks, &target)).await?;

        let pipeline = Pipeline::new(
            index,
            collection.clone(),
            Arc::clone(&self.model),
            self.top_k,
        );
        if let Some(previous) = self.slot.replace(pipeline) {
            // Queries still holding the old pipeline keep its collection alive
            run_blocking(move || {
                drop(previous);
                Ok(())
            })
            .await?;
        }

        info!(
            "Upload complete: {} file(s), {} skipped, {} chunks in {}",
            files.len(),
            skipped.len(),
            chunk_count,
            collection.name
        );
        Ok(UploadSummary {
            files: files.len(),
            skipped,
            chunks: chunk_count,
            collection: collection.name,
        })
    }

    /// Answer `question` with the current pipeline.
    #[inline]
    pub async fn query(&self, question: &str) -> Result<Answer> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(DocQueryError::InvalidRequest(
                "Question must not be empty".to_string(),
            ));
        }

        let pipeline = self.slot.current().ok_or(DocQueryError::NoPipelineBound)?;
        let asked = question.clone();
        let answer = run_blocking(move || pipeline.answer(&asked)).await?;

        info!("Question: {}", question);
        info!("Answer: {}", answer.answer);
        Ok(answer)
    }
}

/// Run blocking provider or store work off the async workers.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DocQueryError::Other(anyhow::anyhow!("Blocking task failed: {}", e)))?
}
