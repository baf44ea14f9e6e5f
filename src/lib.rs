//! # askdoc
//!
//! Retrieval-augmented chat over locally ingested documents, packaged
//! as a channel-driven worker.
//!
//! A [`worker::RagWorker`] owns everything one session needs: a vector
//! index built from the documents it ingested, per-conversation history
//! checkpoints and an LLM provider client (Ollama by default, OpenAI
//! optionally). Hosts talk to it exclusively through a request/event
//! channel pair:
//!
//! ```text
//! INGEST ──▶ ┌───────────┐ ──▶ INGEST_DONE
//!            │ RagWorker │
//! CHAT   ──▶ │  (task)   │ ──▶ QUERY, DOC, TOKEN…, DONE
//!            └───────────┘
//! ```
//!
//! Every chat turn runs the same fixed pipeline: rewrite the question
//! into a standalone search query, retrieve the most similar chunks,
//! then stream a grounded answer token by token. Failures surface as
//! `ERROR` events; the completion event always follows.
//!
//! ```no_run
//! use askdoc::{RagWorker, WorkerConfig, WorkerRequest};
//!
//! # async fn demo() -> Result<(), askdoc::WorkerError> {
//! let worker = RagWorker::new(WorkerConfig::default())?;
//! let (requests, mut events) = worker.spawn();
//!
//! requests.send(WorkerRequest::Ingest {
//!     data: std::fs::read("notes.txt").unwrap(),
//!     source: Some("notes.txt".into()),
//! }).unwrap();
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod protocol;
pub mod worker;

pub use config::WorkerConfig;
pub use errors::WorkerError;
pub use protocol::{WorkerEvent, WorkerRequest};
pub use worker::RagWorker;
