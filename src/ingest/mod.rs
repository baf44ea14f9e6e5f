//! Document ingestion: extraction, chunking and embedding.
//!
//! The [`Ingestor`] drives one document through the full pipeline and
//! appends the result to a [`crate::index::VectorIndex`]. Either every
//! chunk of a document lands in the index or none does.

pub mod extract;
pub mod splitter;

use std::sync::Arc;

pub use extract::{Document, PlainTextExtractor, TextExtractor};
pub use splitter::{Chunk, TextSplitter};

use crate::config::WorkerConfig;
use crate::errors::WorkerError;
use crate::index::VectorIndex;
use crate::llm::LlmProvider;

pub struct Ingestor {
    extractor: Box<dyn TextExtractor>,
    splitter: TextSplitter,
    provider: Arc<dyn LlmProvider>,
    embedding_model: String,
}

impl Ingestor {
    pub fn new(
        extractor: Box<dyn TextExtractor>,
        config: &WorkerConfig,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            extractor,
            splitter: TextSplitter::new(&config.chunking),
            provider,
            embedding_model: config.provider.embedding_model().to_string(),
        }
    }

    /// Extract, chunk, embed and index one document.
    ///
    /// Returns the number of chunks added. A document that extracts to
    /// empty text is a no-op, not an error.
    pub async fn ingest(
        &self,
        data: &[u8],
        source: &str,
        index: &mut VectorIndex,
    ) -> Result<usize, WorkerError> {
        let document = self.extractor.extract(data, source)?;
        let chunks = self.splitter.split(&document.text, &document.source);
        if chunks.is_empty() {
            tracing::info!(source, "document produced no chunks");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self
            .provider
            .embed(&texts, &self.embedding_model)
            .await
            .map_err(WorkerError::ingestion)?;
        if vectors.len() != chunks.len() {
            return Err(WorkerError::ingestion(format!(
                "embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let count = chunks.len();
        index.add(chunks.into_iter().zip(vectors).collect())?;
        tracing::info!(source, chunks = count, "document indexed");
        Ok(count)
    }
}
