//! Wire protocol between a host and a worker session.
//!
//! Requests and events are discriminated unions tagged by `type` with the
//! body under `payload`, e.g. `{"type": "TOKEN", "payload": {"token":
//! "Hi"}}`. Payload-free events serialize as just the tag. Both sides
//! match exhaustively, so adding a variant is a compile-visible change.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::ingest::Chunk;
use crate::llm::ChatMessage;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    /// Ingest one document into the session's index.
    Ingest {
        data: Vec<u8>,
        /// Origin label for the document; generated when absent.
        #[serde(default)]
        source: Option<String>,
    },
    /// Run one conversation turn. The first entry of `messages` carries
    /// the new user utterance; history lives with the worker.
    Chat {
        messages: Vec<ChatMessage>,
        #[serde(rename = "systemPrompt")]
        system_prompt: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerEvent {
    /// Reformulated search query for this turn.
    Query { query: String },
    /// Chunks retrieved for this turn, best match first.
    Doc { docs: Vec<Chunk> },
    /// One streamed increment of the generated answer.
    Token { token: String },
    /// A chat turn resolved, successfully or not.
    Done,
    /// An ingest request resolved, successfully or not.
    IngestDone,
    /// Reported before the completion event of the failing request.
    Error { error: String },
}

/// Sending half of the outbound event channel.
///
/// Emission is fire-and-forget: a host that has dropped its receiver
/// only costs a debug line, never an error in the pipeline.
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl EventEmitter {
    pub fn new(tx: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: WorkerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event receiver dropped, discarding event");
        }
    }

    pub fn query(&self, query: impl Into<String>) {
        self.send(WorkerEvent::Query {
            query: query.into(),
        });
    }

    pub fn docs(&self, docs: Vec<Chunk>) {
        self.send(WorkerEvent::Doc { docs });
    }

    pub fn token(&self, token: impl Into<String>) {
        self.send(WorkerEvent::Token {
            token: token.into(),
        });
    }

    pub fn done(&self) {
        self.send(WorkerEvent::Done);
    }

    pub fn ingest_done(&self) {
        self.send(WorkerEvent::IngestDone);
    }

    pub fn error(&self, error: impl Into<String>) {
        self.send(WorkerEvent::Error {
            error: error.into(),
        });
    }
}
