// Vector store module
// Collections of embedded chunks with nearest-neighbour search

pub mod memory;
pub mod ready;
pub mod redis;

use anyhow::Result;
use uuid::Uuid;

use crate::ingest::Chunk;

pub use self::redis::RedisStore;
pub use memory::MemoryStore;
pub use ready::{poll_until_ready, wait_for_redis};

const COLLECTION_PREFIX: &str = "doc-query";

/// A named set of embedded chunks inside a store. Each successful upload gets its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Collection {
    pub name: String,
}

impl Collection {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Fresh collection with a unique name.
    #[inline]
    pub fn generate() -> Self {
        Self::new(format!("{}:{}", COLLECTION_PREFIX, Uuid::new_v4().simple()))
    }
}

/// A chunk together with its embedding, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Search hit. `score` is cosine similarity, higher is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Backing store for embedded chunks. Calls may block on network I/O.
pub trait VectorStore: Send + Sync {
    fn create_collection(&self, collection: &Collection, dimension: usize) -> Result<()>;

    fn upsert(&self, collection: &Collection, chunks: &[IndexedChunk]) -> Result<()>;

    /// At most `k` chunks, closest first.
    fn search(&self, collection: &Collection, query: &[f32], k: usize)
    -> Result<Vec<ScoredChunk>>;

    fn drop_collection(&self, collection: &Collection) -> Result<()>;
}

/// Cosine similarity, 0.0 when either vector has no magnitude.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
