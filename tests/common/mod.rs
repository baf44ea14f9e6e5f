//! Shared test double for the provider seam.
//!
//! Embeddings are a deterministic 64-dimension bag-of-words hash, so
//! texts sharing words land near each other and retrieval behaves like
//! the real thing without a model. Chat and streaming are scripted per
//! call.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use askdoc::config::WorkerConfig;
use askdoc::ingest::PlainTextExtractor;
use askdoc::llm::{ChatRequest, LlmProvider, ProviderError};
use askdoc::protocol::{WorkerEvent, WorkerRequest};
use askdoc::RagWorker;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// What `chat` (the query rewrite) answers with.
#[derive(Clone)]
pub enum ChatScript {
    /// Return the prompt verbatim; lets tests inspect what was asked.
    Echo,
    Fail(String),
}

/// What one `stream_chat` call produces.
#[derive(Clone)]
pub enum StreamScript {
    Tokens(Vec<String>),
    TokensThenFail(Vec<String>, String),
}

pub struct MockProvider {
    chat: ChatScript,
    streams: Mutex<VecDeque<StreamScript>>,
    embed_failure: Option<String>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            chat: ChatScript::Echo,
            streams: Mutex::new(VecDeque::new()),
            embed_failure: None,
        }
    }

    pub fn failing_rewrite(mut self, error: &str) -> Self {
        self.chat = ChatScript::Fail(error.to_string());
        self
    }

    /// Queue the token stream for the next generation call. Calls with
    /// no queued script fall back to `["The ", "answer", " is 42."]`.
    pub fn then_stream(self, tokens: &[&str]) -> Self {
        self.streams.lock().unwrap().push_back(StreamScript::Tokens(
            tokens.iter().map(|t| t.to_string()).collect(),
        ));
        self
    }

    pub fn then_failing_stream(self, tokens: &[&str], error: &str) -> Self {
        self.streams
            .lock()
            .unwrap()
            .push_back(StreamScript::TokensThenFail(
                tokens.iter().map(|t| t.to_string()).collect(),
                error.to_string(),
            ));
        self
    }

    pub fn failing_embed(mut self, error: &str) -> Self {
        self.embed_failure = Some(error.to_string());
        self
    }
}

/// 64-dimension bag-of-words embedding, FNV-1a over lowercased tokens.
pub fn feature_hash(text: &str) -> Vec<f32> {
    let mut dims = vec![0.0f32; 64];
    for token in text.split_whitespace() {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.to_lowercase().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        dims[(hash % 64) as usize] += 1.0;
    }
    dims
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }

    async fn chat(&self, request: ChatRequest, _: &str) -> Result<String, ProviderError> {
        match &self.chat {
            ChatScript::Echo => Ok(request
                .messages
                .iter()
                .map(|m| m.content.clone())
                .collect::<Vec<_>>()
                .join("\n")),
            ChatScript::Fail(error) => Err(ProviderError::Request(error.clone())),
        }
    }

    async fn stream_chat(
        &self,
        _: ChatRequest,
        _: &str,
    ) -> Result<mpsc::Receiver<Result<String, ProviderError>>, ProviderError> {
        let script = self.streams.lock().unwrap().pop_front().unwrap_or_else(|| {
            StreamScript::Tokens(vec![
                "The ".to_string(),
                "answer".to_string(),
                " is 42.".to_string(),
            ])
        });

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let (tokens, failure) = match script {
                StreamScript::Tokens(tokens) => (tokens, None),
                StreamScript::TokensThenFail(tokens, error) => (tokens, Some(error)),
            };
            for token in tokens {
                if tx.send(Ok(token)).await.is_err() {
                    return;
                }
            }
            if let Some(error) = failure {
                let _ = tx.send(Err(ProviderError::Request(error))).await;
            }
        });
        Ok(rx)
    }

    async fn embed(&self, inputs: &[String], _: &str) -> Result<Vec<Vec<f32>>, ProviderError> {
        if let Some(error) = &self.embed_failure {
            return Err(ProviderError::Request(error.clone()));
        }
        Ok(inputs.iter().map(|text| feature_hash(text)).collect())
    }
}

pub fn spawn_worker(
    provider: MockProvider,
) -> (
    mpsc::UnboundedSender<WorkerRequest>,
    mpsc::UnboundedReceiver<WorkerEvent>,
) {
    RagWorker::with_parts(
        WorkerConfig::default(),
        Arc::new(provider),
        Box::new(PlainTextExtractor),
    )
    .spawn()
}

/// Collect events up to and including the next completion event.
pub async fn events_until_complete(
    rx: &mut mpsc::UnboundedReceiver<WorkerEvent>,
) -> Vec<WorkerEvent> {
    let mut events = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("worker stopped emitting before a completion event")
            .expect("event channel closed before a completion event");
        let complete = matches!(event, WorkerEvent::Done | WorkerEvent::IngestDone);
        events.push(event);
        if complete {
            return events;
        }
    }
}

/// Protocol tags of a batch of events, for order assertions.
pub fn tags(events: &[WorkerEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            WorkerEvent::Query { .. } => "QUERY",
            WorkerEvent::Doc { .. } => "DOC",
            WorkerEvent::Token { .. } => "TOKEN",
            WorkerEvent::Done => "DONE",
            WorkerEvent::IngestDone => "INGEST_DONE",
            WorkerEvent::Error { .. } => "ERROR",
        })
        .collect()
}
