//! Conversation orchestration: per-turn stages, history trimming and
//! checkpointed session state.

pub mod prompts;
pub mod session;
pub mod state;
pub mod trimmer;
pub mod turn;

pub use session::CheckpointStore;
pub use state::ConversationState;
pub use trimmer::HistoryTrimmer;
pub use turn::{TurnPipeline, TurnStage};
