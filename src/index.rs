//! In-memory vector index over document chunks.
//!
//! Append-only: chunks enter through [`VectorIndex::add`] during ingestion
//! and are never mutated or removed. Search embeds the query text through
//! the same provider that embedded the chunks and ranks by cosine
//! similarity, breaking ties by insertion order.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::errors::WorkerError;
use crate::ingest::Chunk;
use crate::llm::LlmProvider;

/// A chunk returned from search together with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

pub struct VectorIndex {
    provider: Arc<dyn LlmProvider>,
    embedding_model: String,
    entries: Vec<(Chunk, Vec<f32>)>,
    dimension: Option<usize>,
}

impl VectorIndex {
    pub fn new(provider: Arc<dyn LlmProvider>, embedding_model: String) -> Self {
        Self {
            provider,
            embedding_model,
            entries: Vec::new(),
            dimension: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a batch of embedded chunks.
    ///
    /// The whole batch is validated before anything is stored, so a
    /// dimension mismatch leaves the index untouched.
    pub fn add(&mut self, entries: Vec<(Chunk, Vec<f32>)>) -> Result<(), WorkerError> {
        let Some(first) = entries.first() else {
            return Ok(());
        };
        if first.1.is_empty() {
            return Err(WorkerError::ingestion("empty embedding vector"));
        }
        let dimension = self.dimension.unwrap_or(first.1.len());
        for (chunk, vector) in &entries {
            if vector.len() != dimension {
                return Err(WorkerError::ingestion(format!(
                    "embedding dimension mismatch for chunk {} of {}: expected {}, got {}",
                    chunk.chunk_index,
                    chunk.source,
                    dimension,
                    vector.len()
                )));
            }
        }
        self.dimension = Some(dimension);
        self.entries.extend(entries);
        Ok(())
    }

    /// Embed `query` and return the `k` most similar chunks.
    ///
    /// `k` is clamped to the number of stored chunks; an empty index
    /// yields an empty result without calling the provider.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, WorkerError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self
            .provider
            .embed(&[query.to_string()], &self.embedding_model)
            .await
            .map_err(WorkerError::retrieval)?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| WorkerError::retrieval("provider returned no query embedding"))?;

        if let Some(dimension) = self.dimension {
            if query_vector.len() != dimension {
                return Err(WorkerError::retrieval(format!(
                    "query embedding dimension {} does not match index dimension {}",
                    query_vector.len(),
                    dimension
                )));
            }
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(&query_vector, vector),
            })
            .collect();

        // Vec::sort_by is stable, so equal scores keep insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        tracing::debug!(
            candidates = self.entries.len(),
            returned = scored.len(),
            "index searched"
        );
        Ok(scored)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
