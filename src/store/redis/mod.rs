
use anyhow::{Context, Result, anyhow};
use redis::{Client, Connection, RedisResult, Value};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Collection, IndexedChunk, ScoredChunk, VectorStore};
use crate::ingest::Chunk;

const DISTANCE_FIELD: &str = "vector_distance";
const RETURN_FIELDS: [&str; 5] = ["content", "source", "page", "chunk_index", DISTANCE_FIELD];

/// RediSearch-backed store. Each collection is one `FT` index over the hashes under
/// `<collection>:`.
pub struct RedisStore {
    client: Client,
    connection: Mutex<Option<Connection>>,
    connect_timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("target", &self.client.get_connection_info().addr)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Wrap a client, reusing `connection` (typically the one handed back by the readiness
    /// wait) until it fails.
    #[inline]
    pub fn new(client: Client, connection: Option<Connection>) -> Self {
        Self {
            client,
            connection: Mutex::new(connection),
            connect_timeout: Duration::from_secs(5),
        }
    }

    #[inline]
    pub fn open(host: &str, port: u16) -> Result<Self> {
        let client = Client::open(redis_url(host, port))
            .with_context(|| format!("Invalid Redis address {}:{}", host, port))?;
        Ok(Self::new(client, None))
    }

    fn with_connection<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> RedisResult<T>,
    {
        let mut slot = self
            .connection
            .lock()
            .map_err(|_| anyhow!("Redis connection lock poisoned"))?;

        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => self
                .client
                .get_connection_with_timeout(self.connect_timeout)
                .context("Failed to connect to Redis")?,
        };

        let result = operation(&mut connection);
        match &result {
            Err(e) if e.is_io_error() || e.is_connection_dropped() => {
                warn!("Discarding broken Redis connection: {}", e);
            }
            _ => *slot = Some(connection),
        }

        result.map_err(anyhow::Error::from)
    }
}

impl VectorStore for RedisStore {
    fn create_collection(&self, collection: &Collection, dimension: usize) -> Result<()> {
        let command = create_index_command(collection, dimension);
        self.with_connection(|con| command.query::<()>(con))
            .with_context(|| format!("Failed to create index {}", collection.name))?;

        info!(
            "Created Redis index {} ({} dimensions)",
            collection.name, dimension
        );
        Ok(())
    }

    fn upsert(&self, collection: &Collection, chunks: &[IndexedChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for (position, entry) in chunks.iter().enumerate() {
            let key = format!("{}:{}", key_prefix(collection), position);
            let command = pipe
                .cmd("HSET")
                .arg(&key)
                .arg("content")
                .arg(&entry.chunk.content)
                .arg("source")
                .arg(&entry.chunk.source)
                .arg("chunk_index")
                .arg(entry.chunk.chunk_index)
                .arg("embedding")
                .arg(vector_to_bytes(&entry.embedding));
            if let Some(page) = entry.chunk.page {
                command.arg("page").arg(page);
            }
            command.ignore();
        }

        self.with_connection(|con| pipe.query::<()>(con))
            .with_context(|| format!("Failed to write chunks to {}", collection.name))?;

        debug!("Stored {} chunks in {}", chunks.len(), collection.name);
        Ok(())
    }

    fn search(
        &self,
        collection: &Collection,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let command = search_command(collection, query, k);
        let reply = self
            .with_connection(|con| command.query::<Value>(con))
            .with_context(|| format!("Failed to search {}", collection.name))?;

        parse_search_reply(&reply)
    }

    fn drop_collection(&self, collection: &Collection) -> Result<()> {
        self.with_connection(|con| {
            redis::cmd("FT.DROPINDEX")
                .arg(&collection.name)
                .arg("DD")
                .query::<()>(con)
        })
        .with_context(|| format!("Failed to drop index {}", collection.name))?;

        info!("Dropped Redis index {}", collection.name);
        Ok(())
    }
}

#[inline]
pub fn redis_url(host: &str, port: u16) -> String {
    format!("redis://{}:{}/", host, port)
}

fn key_prefix(collection: &Collection) -> String {
    format!("{}:", collection.name)
}

fn create_index_command(collection: &Collection, dimension: usize) -> redis::Cmd {
    let mut command = redis::cmd("FT.CREATE");
    command
        .arg(&collection.name)
        .arg("ON")
        .arg("HASH")
        .arg("PREFIX")
        .arg(1)
        .arg(key_prefix(collection))
        .arg("SCHEMA")
        .arg("content")
        .arg("TEXT")
        .arg("source")
        .arg("TAG")
        .arg("page")
        .arg("NUMERIC")
        .arg("chunk_index")
        .arg("NUMERIC")
        .arg("embedding")
        .arg("VECTOR")
        .arg("FLAT")
        .arg(6)
        .arg("TYPE")
        .arg("FLOAT32")
        .arg("DIM")
        .arg(dimension)
        .arg("DISTANCE_METRIC")
        .arg("COSINE");
    command
}

fn search_command(collection: &Collection, query: &[f32], k: usize) -> redis::Cmd {
    let mut command = redis::cmd("FT.SEARCH");
    command
        .arg(&collection.name)
        .arg(format!(
            "*=>[KNN {} @embedding $query_vector AS {}]",
            k, DISTANCE_FIELD
        ))
        .arg("PARAMS")
        .arg(2)
        .arg("query_vector")
        .arg(vector_to_bytes(query))
        .arg("SORTBY")
        .arg(DISTANCE_FIELD)
        .arg("ASC")
        .arg("RETURN")
        .arg(RETURN_FIELDS.len())
        .arg(&RETURN_FIELDS[..])
        .arg("LIMIT")
        .arg(0)
        .arg(k)
        .arg("DIALECT")
        .arg(2);
    command
}

/// Little-endian FLOAT32 blob as RediSearch expects it.
#[inline]
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|value| value.to_le_bytes()).collect()
}

#[inline]
pub fn bytes_to_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        anyhow::bail!("Vector blob length {} is not a multiple of 4", bytes.len());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|raw| f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        .collect())
}

/// Decode an `FT.SEARCH` reply: `[total, key, [field, value, ...], key, [...], ...]`.
fn parse_search_reply(reply: &Value) -> Result<Vec<ScoredChunk>> {
    let Value::Array(items) = reply else {
        anyhow::bail!("Unexpected FT.SEARCH reply: {:?}", reply);
    };

    let mut hits = Vec::new();
    // Skip the total count, then walk (key, fields) pairs
    for pair in items.get(1..).unwrap_or_default().chunks(2) {
        let [key, Value::Array(fields)] = pair else {
            anyhow::bail!("Malformed FT.SEARCH document entry");
        };
        let key: String = redis::from_redis_value(key).context("Invalid document key")?;
        hits.push(parse_document(&key, fields)?);
    }

    Ok(hits)
}

fn parse_document(key: &str, fields: &[Value]) -> Result<ScoredChunk> {
    let mut content = None;
    let mut source = None;
    let mut page = None;
    let mut chunk_index = 0;
    let mut distance = None;

    for field in fields.chunks(2) {
        let [name, value] = field else {
            anyhow::bail!("Odd number of fields in document {}", key);
        };
        let name: String = redis::from_redis_value(name)?;
        let value: String = redis::from_redis_value(value)
            .with_context(|| format!("Invalid value for {} in document {}", name, key))?;

        match name.as_str() {
            "content" => content = Some(value),
            "source" => source = Some(value),
            "page" => page = value.parse::<u32>().ok(),
            "chunk_index" => chunk_index = value.parse::<usize>().unwrap_or(0),
            DISTANCE_FIELD => distance = value.parse::<f32>().ok(),
            _ => {}
        }
    }

    let distance = distance.with_context(|| format!("Document {} has no distance", key))?;
    Ok(ScoredChunk {
        chunk: Chunk {
            content: content.with_context(|| format!("Document {} has no content", key))?,
            source: source.unwrap_or_default(),
            page,
            chunk_index,
        },
        // Redis reports cosine distance
        score: 1.0 - distance,
    })
}
