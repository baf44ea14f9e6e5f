use thiserror::Error;

/// Failure categories for a worker session.
///
/// The first three variants map 1:1 onto the phases of a request
/// (ingest, retrieve, generate) and are what the `ERROR` protocol event
/// carries. `Config` covers load/validation problems outside any turn.
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    #[error("ingestion failed: {0}")]
    Ingestion(String),

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl WorkerError {
    pub fn ingestion<E: std::fmt::Display>(err: E) -> Self {
        WorkerError::Ingestion(err.to_string())
    }

    pub fn retrieval<E: std::fmt::Display>(err: E) -> Self {
        WorkerError::Retrieval(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        WorkerError::Generation(err.to_string())
    }

    pub fn config<E: std::fmt::Display>(err: E) -> Self {
        WorkerError::Config(err.to_string())
    }
}
