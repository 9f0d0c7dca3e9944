
use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use super::{Collection, IndexedChunk, ScoredChunk, VectorStore, cosine_similarity};

#[derive(Debug)]
struct MemoryCollection {
    dimension: usize,
    entries: Vec<IndexedChunk>,
}

/// In-process store with brute-force cosine search.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn collection_names(&self) -> Vec<String> {
        self.collections
            .read()
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default()
    }

    #[inline]
    pub fn len(&self, collection: &Collection) -> usize {
        self.collections
            .read()
            .ok()
            .and_then(|collections| {
                collections
                    .get(&collection.name)
                    .map(|stored| stored.entries.len())
            })
            .unwrap_or(0)
    }
}

impl VectorStore for MemoryStore {
    fn create_collection(&self, collection: &Collection, dimension: usize) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;

        if collections.contains_key(&collection.name) {
            anyhow::bail!("Collection {} already exists", collection.name);
        }

        debug!(
            "Creating collection {} with {} dimensions",
            collection.name, dimension
        );
        collections.insert(
            collection.name.clone(),
            MemoryCollection {
                dimension,
                entries: Vec::new(),
            },
        );
        Ok(())
    }

    fn upsert(&self, collection: &Collection, chunks: &[IndexedChunk]) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        let stored = collections
            .get_mut(&collection.name)
            .with_context(|| format!("Unknown collection {}", collection.name))?;

        if let Some(bad) = chunks
            .iter()
            .find(|entry| entry.embedding.len() != stored.dimension)
        {
            anyhow::bail!(
                "Vector dimension mismatch: expected {}, got {}",
                stored.dimension,
                bad.embedding.len()
            );
        }

        stored.entries.extend_from_slice(chunks);
        Ok(())
    }

    fn search(
        &self,
        collection: &Collection,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        let stored = collections
            .get(&collection.name)
            .with_context(|| format!("Unknown collection {}", collection.name))?;

        if query.len() != stored.dimension {
            anyhow::bail!(
                "Query dimension mismatch: expected {}, got {}",
                stored.dimension,
                query.len()
            );
        }

        let mut hits: Vec<ScoredChunk> = stored
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();
        // Stable sort keeps insertion order between equal scores
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    fn drop_collection(&self, collection: &Collection) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        collections.remove(&collection.name);
        Ok(())
    }
}
