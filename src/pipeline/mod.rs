// Pipeline module
// Retrieval-augmented answering over one bound collection

#[cfg(test)]
mod tests;

pub mod prompt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::DocQueryError;
use crate::index::IndexClient;
use crate::providers::ChatModel;
use crate::store::{Collection, ScoredChunk};

pub use prompt::{PromptTemplate, QA_TEMPLATE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    /// Comma separated origins of the retrieved chunks, may be empty
    pub sources: String,
}

/// Retriever, prompt and language model bound to a single collection.
///
/// Once retired, the collection is dropped from the store together with the last
/// reference to the pipeline.
pub struct Pipeline {
    index: Arc<IndexClient>,
    collection: Collection,
    model: Arc<dyn ChatModel>,
    prompt: PromptTemplate,
    top_k: usize,
    retired: AtomicBool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("collection", &self.collection)
            .field("top_k", &self.top_k)
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    #[inline]
    pub fn new(
        index: Arc<IndexClient>,
        collection: Collection,
        model: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            collection,
            model,
            prompt: PromptTemplate::default(),
            top_k: top_k.max(1),
            retired: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    #[inline]
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Mark the collection for removal when this pipeline is dropped.
    #[inline]
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Retrieve context for `question`, ask the model, and return the trimmed reply.
    #[inline]
    pub fn answer(&self, question: &str) -> crate::Result<Answer> {
        let hits = self.index.retrieve(question, &self.collection, self.top_k)?;
        let prompt = self.prompt.render(&format_context(&hits), question);

        debug!(
            "Prompting model with {} chunks ({} chars)",
            hits.len(),
            prompt.len()
        );
        let reply = self
            .model
            .complete(&prompt)
            .map_err(|e| DocQueryError::dependency(&e))?;

        Ok(Answer {
            answer: reply.trim().to_string(),
            sources: format_sources(&hits),
        })
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if *self.retired.get_mut() {
            debug!("Last reference to {} released", self.collection.name);
            self.index.discard(&self.collection);
        }
    }
}

/// Chunk texts in rank order, separated by blank lines.
#[inline]
pub fn format_context(hits: &[ScoredChunk]) -> String {
    hits.iter().map(|hit| hit.chunk.content.as_str()).join("\n\n")
}

/// Distinct chunk origins in rank order, e.g. `report.pdf (page 2), notes.md`.
#[inline]
pub fn format_sources(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| hit.chunk.source_label())
        .unique()
        .join(", ")
}

/// The service's single "current pipeline" slot. Empty until the first successful upload,
/// after which every read sees one complete pipeline.
#[derive(Debug, Default)]
pub struct PipelineSlot {
    current: Mutex<Option<Arc<Pipeline>>>,
}

impl PipelineSlot {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> Option<Arc<Pipeline>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bind `pipeline` and hand back the one it replaced, already retired.
    ///
    /// Dropping the returned pipeline may block on the store, so callers on async workers
    /// should release it on a blocking thread.
    #[inline]
    pub fn replace(&self, pipeline: Pipeline) -> Option<Arc<Pipeline>> {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(pipeline));
        if let Some(previous) = &previous {
            previous.retire();
        }
        previous
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
