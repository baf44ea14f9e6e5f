//! Prompt templates for query reformulation and grounded generation.
//!
//! The wording here is deliberately fixed. Retrieval quality is tuned to
//! these exact instructions, so changes belong in one place only.

use crate::ingest::Chunk;
use crate::llm::ChatMessage;

const QUERY_REWRITE_INSTRUCTION: &str = "Given the above conversation, rephrase the following \
question into a natural language query with important keywords that a researcher could later \
pass into a search engine to get information relevant to the conversation. Do not respond with \
anything except the query.";

/// Render the last `window` messages as a plain conversation digest,
/// one `Role: content` line per message, most recent last.
pub fn message_digest(messages: &[ChatMessage], window: usize) -> String {
    let start = messages.len().saturating_sub(window);
    messages[start..]
        .iter()
        .map(|message| {
            let role = if message.role == "assistant" {
                "Assistant"
            } else {
                "User"
            };
            format!("{role}: {content}", content = message.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the single-message reformulation prompt from the conversation
/// digest and the question to rewrite.
pub fn query_rewrite_prompt(digest: &str, question: &str) -> String {
    format!("{digest}\n {QUERY_REWRITE_INSTRUCTION} {question}")
}

/// Render retrieved chunks into the context block fed to generation.
pub fn render_docs(docs: &[Chunk]) -> String {
    docs.iter()
        .map(|doc| format!("Content: {content}\n", content = doc.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The user-role instruction that wraps the rendered context block.
pub fn context_instruction(docs: &[Chunk]) -> String {
    format!(
        "use the following documents as context:\n<context>\n{docs}\n</context>",
        docs = render_docs(docs)
    )
}
