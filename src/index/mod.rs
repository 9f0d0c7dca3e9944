// Index module
// Embeds chunks into a store collection and answers similarity queries against it


use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::DocQueryError;
use crate::ingest::Chunk;
use crate::providers::Embedder;
use crate::store::{Collection, IndexedChunk, ScoredChunk, VectorStore};

/// Pairs an embedding provider with a vector store.
#[derive(Clone)]
pub struct IndexClient {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for IndexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexClient").finish_non_exhaustive()
    }
}

impl IndexClient {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed `chunks` and write them into a new `collection`.
    ///
    /// Either every chunk is stored or the collection is dropped again and the call fails
    /// with [`DocQueryError::DependencyUnavailable`].
    #[inline]
    pub fn index(&self, chunks: &[Chunk], collection: &Collection) -> crate::Result<()> {
        if chunks.is_empty() {
            return Err(DocQueryError::EmptyUpload);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let embeddings = self
            .embedder
            .embed_documents(&texts)
            .map_err(|e| DocQueryError::dependency(&e))?;

        if embeddings.len() != chunks.len() {
            return Err(DocQueryError::DependencyUnavailable(format!(
                "Embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimension = embeddings.first().map_or(0, Vec::len);
        if dimension == 0 {
            return Err(DocQueryError::DependencyUnavailable(
                "Embedding provider returned empty vectors".to_string(),
            ));
        }

        let entries: Vec<IndexedChunk> = chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
            .collect();

        self.store
            .create_collection(collection, dimension)
            .map_err(|e| DocQueryError::dependency(&e))?;

        if let Err(e) = self.store.upsert(collection, &entries) {
            self.discard(collection);
            return Err(DocQueryError::dependency(&e));
        }

        info!(
            "Indexed {} chunks into {} ({} dimensions)",
            entries.len(),
            collection.name,
            dimension
        );
        Ok(())
    }

    /// The `k` chunks of `collection` closest to `query`, best first.
    #[inline]
    pub fn retrieve(
        &self,
        query: &str,
        collection: &Collection,
        k: usize,
    ) -> crate::Result<Vec<ScoredChunk>> {
        let vector = self
            .embedder
            .embed_query(query)
            .map_err(|e| DocQueryError::dependency(&e))?;

        let hits = self
            .store
            .search(collection, &vector, k)
            .map_err(|e| DocQueryError::dependency(&e))?;

        debug!("Retrieved {} chunks from {}", hits.len(), collection.name);
        Ok(hits)
    }

    /// Best-effort removal of a collection that is no longer bound.
    #[inline]
    pub fn discard(&self, collection: &Collection) {
        if let Err(e) = self.store.drop_collection(collection) {
            warn!("Failed to drop collection {}: {:#}", collection.name, e);
        }
    }
}
