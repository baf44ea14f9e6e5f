use std::collections::HashMap;

use super::state::ConversationState;

/// In-memory per-conversation checkpoints.
///
/// Reads hand out a clone so a turn can mutate freely and commit with
/// `put` once it resolves; an unknown identifier starts from an empty
/// state. Nothing is shared across identifiers.
#[derive(Debug, Default)]
pub struct CheckpointStore {
    states: HashMap<String, ConversationState>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, thread_id: &str) -> ConversationState {
        self.states.get(thread_id).cloned().unwrap_or_default()
    }

    pub fn put(&mut self, thread_id: &str, state: ConversationState) {
        self.states.insert(thread_id.to_string(), state);
    }
}
