//! The worker session: one task owning an index, a checkpoint store and
//! a provider handle, driven entirely through channels.
//!
//! Requests are processed strictly in arrival order; the unbounded
//! request channel is the queue. Every request resolves with its
//! completion event (`INGEST_DONE` or `DONE`) no matter how it went, so
//! a host can always pair requests with completions.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::errors::WorkerError;
use crate::index::VectorIndex;
use crate::ingest::{Ingestor, PlainTextExtractor, TextExtractor};
use crate::llm::{create_provider, ChatMessage, LlmProvider};
use crate::pipeline::{CheckpointStore, TurnPipeline};
use crate::protocol::{EventEmitter, WorkerEvent, WorkerRequest};

/// One retrieval-augmented chat session.
///
/// Construct it, then [`RagWorker::spawn`] it to get the channel pair
/// the host talks through. The session ends when the request sender is
/// dropped; the index and conversation state go with it.
pub struct RagWorker {
    config: WorkerConfig,
    provider: Arc<dyn LlmProvider>,
    extractor: Box<dyn TextExtractor>,
    thread_id: String,
}

impl RagWorker {
    /// Build a worker from configuration alone, with the provider named
    /// by `config.provider` and plain-text extraction.
    pub fn new(config: WorkerConfig) -> Result<Self, WorkerError> {
        config.validate()?;
        let provider = create_provider(&config.provider)?;
        Ok(Self::assemble(config, provider, Box::new(PlainTextExtractor)))
    }

    /// Build a worker from pre-assembled parts. Used by hosts that bring
    /// their own extractor (PDF and friends) or provider client; the
    /// config is taken as given.
    pub fn with_parts(
        config: WorkerConfig,
        provider: Arc<dyn LlmProvider>,
        extractor: Box<dyn TextExtractor>,
    ) -> Self {
        Self::assemble(config, provider, extractor)
    }

    fn assemble(
        config: WorkerConfig,
        provider: Arc<dyn LlmProvider>,
        extractor: Box<dyn TextExtractor>,
    ) -> Self {
        Self {
            config,
            provider,
            extractor,
            thread_id: Uuid::new_v4().to_string(),
        }
    }

    /// Conversation identifier for this session's checkpoints.
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Start the session task and hand back its channel pair.
    pub fn spawn(
        self,
    ) -> (
        mpsc::UnboundedSender<WorkerRequest>,
        mpsc::UnboundedReceiver<WorkerEvent>,
    ) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(self.run(request_rx, EventEmitter::new(event_tx)));
        (request_tx, event_rx)
    }

    async fn run(self, mut requests: mpsc::UnboundedReceiver<WorkerRequest>, emitter: EventEmitter) {
        let RagWorker {
            config,
            provider,
            extractor,
            thread_id,
        } = self;

        let ingestor = Ingestor::new(extractor, &config, provider.clone());
        let mut index = VectorIndex::new(
            provider.clone(),
            config.provider.embedding_model().to_string(),
        );
        let mut sessions = CheckpointStore::new();
        let pipeline = TurnPipeline::new(&config, provider.clone(), emitter.clone());

        match provider.health_check().await {
            Ok(true) => {
                tracing::info!(provider = provider.name(), %thread_id, "session started")
            }
            _ => tracing::warn!(
                provider = provider.name(),
                %thread_id,
                "session started but provider is unreachable"
            ),
        }

        while let Some(request) = requests.recv().await {
            match request {
                WorkerRequest::Ingest { data, source } => {
                    handle_ingest(&ingestor, &mut index, &emitter, &data, source).await;
                }
                WorkerRequest::Chat {
                    messages,
                    system_prompt,
                } => {
                    handle_chat(
                        &pipeline,
                        &index,
                        &mut sessions,
                        &thread_id,
                        &emitter,
                        messages,
                        system_prompt,
                    )
                    .await;
                }
            }
        }

        tracing::debug!(%thread_id, "request channel closed, session over");
    }
}

async fn handle_ingest(
    ingestor: &Ingestor,
    index: &mut VectorIndex,
    emitter: &EventEmitter,
    data: &[u8],
    source: Option<String>,
) {
    let source = source.unwrap_or_else(|| format!("document-{}", Uuid::new_v4()));

    match ingestor.ingest(data, &source, index).await {
        Ok(count) => {
            tracing::info!(%source, chunks = count, indexed = index.len(), "ingest complete")
        }
        Err(err) => {
            tracing::error!(%source, error = %err, "ingest failed");
            emitter.error(err.to_string());
        }
    }
    emitter.ingest_done();
}

async fn handle_chat(
    pipeline: &TurnPipeline,
    index: &VectorIndex,
    sessions: &mut CheckpointStore,
    thread_id: &str,
    emitter: &EventEmitter,
    messages: Vec<ChatMessage>,
    system_prompt: String,
) {
    let outcome = match messages.into_iter().next() {
        Some(incoming) => {
            let mut state = sessions.get(thread_id);
            state.system_prompt = system_prompt;
            // Only the content travels; the role is ours to assign.
            state.messages.push(ChatMessage::user(incoming.content));

            let result = pipeline.run(&mut state, index).await;
            // Checkpoint even after a failed turn so the user message
            // is part of the next turn's history.
            sessions.put(thread_id, state);
            result
        }
        None => Err(WorkerError::generation("chat request carried no messages")),
    };

    if let Err(err) = outcome {
        tracing::error!(thread_id, error = %err, "chat turn failed");
        emitter.error(err.to_string());
    }
    emitter.done();
}
