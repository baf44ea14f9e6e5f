//! One conversation turn: CREATE_QUERY → RETRIEVE → GENERATE.
//!
//! The sequence is a fixed linear pass over [`TurnStage`]; no stage is
//! skipped, branched or retried. Any failure aborts the remaining stages
//! and bubbles to the worker loop, which owns the completion events.

use std::sync::Arc;

use super::prompts;
use super::state::ConversationState;
use super::trimmer::HistoryTrimmer;
use crate::config::WorkerConfig;
use crate::errors::WorkerError;
use crate::index::VectorIndex;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::protocol::EventEmitter;

/// Stages of a turn, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    CreateQuery,
    Retrieve,
    Generate,
}

impl TurnStage {
    pub const SEQUENCE: [TurnStage; 3] = [
        TurnStage::CreateQuery,
        TurnStage::Retrieve,
        TurnStage::Generate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStage::CreateQuery => "create_query",
            TurnStage::Retrieve => "retrieve",
            TurnStage::Generate => "generate",
        }
    }
}

pub struct TurnPipeline {
    provider: Arc<dyn LlmProvider>,
    emitter: EventEmitter,
    trimmer: HistoryTrimmer,
    chat_model: String,
    temperature: f64,
    top_k: usize,
    digest_window: usize,
}

impl TurnPipeline {
    pub fn new(
        config: &WorkerConfig,
        provider: Arc<dyn LlmProvider>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            provider,
            emitter,
            trimmer: HistoryTrimmer::new(&config.history),
            chat_model: config.provider.chat_model().to_string(),
            temperature: config.provider.temperature,
            top_k: config.retrieval.top_k,
            digest_window: config.history.digest_window,
        }
    }

    /// Drive one turn over `state`. The latest entry of `state.messages`
    /// must be the user message this turn answers.
    pub async fn run(
        &self,
        state: &mut ConversationState,
        index: &VectorIndex,
    ) -> Result<(), WorkerError> {
        for stage in TurnStage::SEQUENCE {
            tracing::debug!(stage = stage.as_str(), "turn stage starting");
            match stage {
                TurnStage::CreateQuery => self.create_query(state).await?,
                TurnStage::Retrieve => self.retrieve(state, index).await?,
                TurnStage::Generate => self.generate(state).await?,
            }
        }
        Ok(())
    }

    /// Rewrite the latest user utterance into a standalone search query.
    async fn create_query(&self, state: &mut ConversationState) -> Result<(), WorkerError> {
        let question = state
            .messages
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default();
        let digest = prompts::message_digest(&state.messages, self.digest_window);
        let prompt = prompts::query_rewrite_prompt(&digest, &question);

        let request =
            ChatRequest::new(vec![ChatMessage::user(prompt)]).with_temperature(self.temperature);
        let query = self
            .provider
            .chat(request, &self.chat_model)
            .await
            .map_err(WorkerError::generation)?;

        // Whatever the model answered is the query, verbatim.
        state.generated_query = query;
        self.emitter.query(state.generated_query.clone());
        Ok(())
    }

    async fn retrieve(
        &self,
        state: &mut ConversationState,
        index: &VectorIndex,
    ) -> Result<(), WorkerError> {
        let results = index.search(&state.generated_query, self.top_k).await?;
        state.retrieved_docs = results.into_iter().map(|scored| scored.chunk).collect();
        self.emitter.docs(state.retrieved_docs.clone());
        Ok(())
    }

    /// Stream the grounded answer, forwarding each delta as it arrives.
    async fn generate(&self, state: &mut ConversationState) -> Result<(), WorkerError> {
        let mut messages = Vec::with_capacity(state.messages.len() + 2);
        messages.push(ChatMessage::system(state.system_prompt.clone()));
        messages.push(ChatMessage::user(prompts::context_instruction(
            &state.retrieved_docs,
        )));
        messages.extend(self.trimmer.trim(&state.messages));

        let request = ChatRequest::new(messages).with_temperature(self.temperature);
        let mut tokens = self
            .provider
            .stream_chat(request, &self.chat_model)
            .await
            .map_err(WorkerError::generation)?;

        let mut answer = String::new();
        while let Some(item) = tokens.recv().await {
            // A failed stream drops the partial answer on the floor.
            let token = item.map_err(WorkerError::generation)?;
            self.emitter.token(token.clone());
            answer.push_str(&token);
        }

        state.messages.push(ChatMessage::assistant(answer));
        Ok(())
    }
}
