use crate::ingest::Chunk;
use crate::llm::ChatMessage;

/// Everything one conversation carries between turns.
///
/// `messages` is the append-only user/assistant history. The remaining
/// fields are overwritten in place as a turn progresses: the system
/// prompt is taken fresh from each request, the query during
/// reformulation and the documents during retrieval. Values from a
/// previous turn persist until the stage that owns them runs again.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    pub retrieved_docs: Vec<Chunk>,
    pub generated_query: String,
    pub system_prompt: String,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }
}
