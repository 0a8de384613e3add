//! # Retrieval Index Module
//!
//! ## Purpose
//! Capability interface between the pipeline and whatever vector store backs
//! retrieval, plus two concrete stores: an in-memory index for tests and
//! small corpora, and a sled-backed index for persistent deployments.
//!
//! ## Input/Output Specification
//! - **Input**: Chunks to upsert, query text with a result budget
//! - **Output**: Chunks ranked by relevance, most relevant first
//! - **Identity**: `{filename}:{section_title}:{chunk_index}`; re-ingesting a
//!   document overwrites its chunks instead of duplicating them
//!
//! ## Key Features
//! - Deterministic hashing embedder, no model download required
//! - Stable ordering: score descending, insertion order breaking ties
//! - Optional gzip compression of persisted chunk records
//! - A search budget of zero is a programmer error and fails fast

use crate::config::IndexConfig;
use crate::errors::{RagError, Result};
use crate::{Chunk, RetrievedChunk};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::sync::Arc;

/// Embedding capability. Implementations must be deterministic for the
/// lifetime of an index: mixing embedders over one store produces garbage
/// rankings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimension of the vectors this embedder produces.
    fn dimension(&self) -> usize;
}

/// Vector index capability used by the pipeline for storage and retrieval.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite chunks keyed by their identity.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()>;

    /// Return up to `k` chunks ranked by relevance to `query`, most relevant
    /// first. An empty index yields an empty result, never an error; `k == 0`
    /// fails fast.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Number of chunks currently stored.
    async fn len(&self) -> Result<usize>;
}

fn check_budget(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RagError::InvalidArgument {
            field: "k".to_string(),
            reason: "search budget must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Cosine similarity with a zero-norm guard.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Deterministic bag-of-words hashing embedder.
///
/// Tokens are lowercased, hashed into a fixed number of buckets and the
/// resulting count vector is L2-normalized. Not a semantic model, but cheap,
/// dependency-free and stable, which is what tests and small deployments
/// need.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

struct MemoryEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
    /// Insertion order, preserved across overwrites of the same identity
    seq: u64,
}

/// In-memory vector index. Suitable for tests and corpora that fit in RAM.
pub struct InMemoryVectorIndex {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<HashMap<String, MemoryEntry>>,
    next_seq: RwLock<u64>,
}

impl InMemoryVectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(HashMap::new()),
            next_seq: RwLock::new(0),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            let embedding = self.embedder.embed(&chunk.text).await?;
            let identity = chunk.identity();

            let mut entries = self.entries.write();
            let seq = match entries.get(&identity) {
                Some(existing) => existing.seq,
                None => {
                    let mut next = self.next_seq.write();
                    let seq = *next;
                    *next += 1;
                    seq
                }
            };
            entries.insert(
                identity,
                MemoryEntry {
                    chunk: chunk.clone(),
                    embedding,
                    seq,
                },
            );
        }
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        check_budget(k)?;
        let query_embedding = self.embedder.embed(query).await?;

        let entries = self.entries.read();
        let mut scored: Vec<(f32, u64, Chunk)> = entries
            .values()
            .map(|entry| {
                (
                    cosine_similarity(&query_embedding, &entry.embedding),
                    entry.seq,
                    entry.chunk.clone(),
                )
            })
            .collect();
        drop(entries);

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(relevance_score, _, chunk)| RetrievedChunk {
                chunk,
                relevance_score,
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }
}

/// One persisted chunk record.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
    seq: u64,
}

/// Sled-backed vector index with optional gzip compression of records.
///
/// Scoring scans the full tree; fine for the corpus sizes this system
/// targets (statutes and acts, not web-scale crawls).
pub struct SledVectorIndex {
    db: sled::Db,
    tree: sled::Tree,
    embedder: Arc<dyn Embedder>,
    enable_compression: bool,
}

impl SledVectorIndex {
    /// Open or create the index at the configured path.
    pub fn open(config: &IndexConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let db = sled::open(&config.db_path)?;
        let tree = db.open_tree("chunks")?;
        tracing::info!(
            path = %config.db_path.display(),
            stored_chunks = tree.len(),
            "Opened persistent index"
        );
        Ok(Self {
            db,
            tree,
            embedder,
            enable_compression: config.enable_compression,
        })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.tree.flush()?;
        Ok(())
    }

    fn encode(&self, entry: &StoredEntry) -> Result<Vec<u8>> {
        let raw = bincode::serialize(entry)?;
        if !self.enable_compression {
            return Ok(raw);
        }
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<StoredEntry> {
        // Gzip magic sniffing keeps old uncompressed stores readable after
        // compression is switched on
        if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
            let mut decoder = flate2::read::GzDecoder::new(bytes);
            let mut raw = Vec::new();
            decoder.read_to_end(&mut raw)?;
            Ok(bincode::deserialize(&raw)?)
        } else {
            Ok(bincode::deserialize(bytes)?)
        }
    }
}

#[async_trait]
impl VectorIndex for SledVectorIndex {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for chunk in chunks {
            let embedding = self.embedder.embed(&chunk.text).await?;
            let identity = chunk.identity();

            // Overwrites keep their original insertion order
            let seq = match self.tree.get(identity.as_bytes())? {
                Some(existing) => self.decode(&existing)?.seq,
                None => self.db.generate_id()?,
            };

            let entry = StoredEntry {
                chunk: chunk.clone(),
                embedding,
                seq,
            };
            batch.insert(identity.as_bytes(), self.encode(&entry)?);
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        check_budget(k)?;
        let query_embedding = self.embedder.embed(query).await?;

        let mut scored: Vec<(f32, u64, Chunk)> = Vec::new();
        for item in self.tree.iter() {
            let (_, value) = item.map_err(|e| RagError::IndexUnavailable {
                details: format!("index scan failed: {}", e),
            })?;
            let entry = self.decode(&value)?;
            scored.push((
                cosine_similarity(&query_embedding, &entry.embedding),
                entry.seq,
                entry.chunk,
            ));
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(relevance_score, _, chunk)| RetrievedChunk {
                chunk,
                relevance_score,
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.tree.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{meta, Metadata};

    fn chunk(filename: &str, title: &str, index: usize, text: &str) -> Chunk {
        let mut metadata = Metadata::new();
        metadata.insert(meta::FILENAME.to_string(), filename.to_string());
        Chunk {
            text: text.to_string(),
            section_title: title.to_string(),
            chunk_index: index,
            is_full_section: true,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_embedder_is_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("notice to quit a lease").await.unwrap();
        let b = embedder.embed("notice to quit a lease").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), embedder.dimension());
    }

    #[tokio::test]
    async fn test_embedder_ranks_related_text_higher() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("landlord notice period lease").await.unwrap();
        let related = embedder
            .embed("the landlord shall give notice before ending the lease")
            .await
            .unwrap();
        let unrelated = embedder
            .embed("criminal procedure for bail hearings")
            .await
            .unwrap();
        assert!(
            cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated)
        );
    }

    #[tokio::test]
    async fn test_zero_vector_similarity_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let index = InMemoryVectorIndex::new(Arc::new(HashingEmbedder::default()));
        let chunks = vec![chunk("tpa.txt", "Section 106", 0, "Section 106\nNotice rules.")];

        index.upsert(&chunks).await.unwrap();
        index.upsert(&chunks).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_orders_by_relevance() {
        let index = InMemoryVectorIndex::new(Arc::new(HashingEmbedder::default()));
        index
            .upsert(&[
                chunk(
                    "tpa.txt",
                    "Section 106",
                    0,
                    "Section 106\nDuration of lease and notice to quit.",
                ),
                chunk(
                    "crpc.txt",
                    "Section 437",
                    0,
                    "Section 437\nWhen bail may be taken for non-bailable offences.",
                ),
            ])
            .await
            .unwrap();

        let results = index.search("lease notice to quit", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.section_title, "Section 106");
        assert!(results[0].relevance_score >= results[1].relevance_score);
    }

    #[tokio::test]
    async fn test_search_empty_index_yields_no_results() {
        let index = InMemoryVectorIndex::new(Arc::new(HashingEmbedder::default()));
        assert!(index.search("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_budget_fails_fast() {
        let index = InMemoryVectorIndex::new(Arc::new(HashingEmbedder::default()));
        assert!(matches!(
            index.search("anything", 0).await,
            Err(RagError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_sled_index_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexConfig {
            db_path: dir.path().join("index"),
            enable_compression: true,
        };

        {
            let index =
                SledVectorIndex::open(&config, Arc::new(HashingEmbedder::default())).unwrap();
            index
                .upsert(&[chunk(
                    "tpa.txt",
                    "Section 106",
                    0,
                    "Section 106\nNotice to quit.",
                )])
                .await
                .unwrap();
            index.flush().unwrap();
        }

        let index = SledVectorIndex::open(&config, Arc::new(HashingEmbedder::default())).unwrap();
        assert_eq!(index.len().await.unwrap(), 1);
        let results = index.search("notice to quit", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.section_title, "Section 106");
    }

    #[tokio::test]
    async fn test_sled_index_without_compression() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexConfig {
            db_path: dir.path().join("index"),
            enable_compression: false,
        };
        let index = SledVectorIndex::open(&config, Arc::new(HashingEmbedder::default())).unwrap();

        index
            .upsert(&[chunk("tpa.txt", "Section 106", 0, "Section 106\nBody.")])
            .await
            .unwrap();
        let results = index.search("body", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
