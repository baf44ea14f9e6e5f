use crate::config::{BudgetUnit, HistoryConfig};
use crate::llm::ChatMessage;

/// Rough token estimate at ~4 bytes per token, rounded up.
pub(crate) fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Keeps the most recent slice of a conversation within a fixed budget.
///
/// System messages are always retained in place and never consume
/// budget. The remaining messages form a contiguous suffix that fits the
/// budget at whole-message granularity. When that suffix would open on
/// assistant messages while a user message is available further in, the
/// leading assistant messages are dropped so the window never starts
/// mid-exchange.
pub struct HistoryTrimmer {
    budget: usize,
    unit: BudgetUnit,
}

impl HistoryTrimmer {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            budget: config.budget,
            unit: config.unit,
        }
    }

    fn cost(&self, message: &ChatMessage) -> usize {
        match self.unit {
            BudgetUnit::Tokens => estimate_tokens(&message.content),
            BudgetUnit::Messages => 1,
        }
    }

    pub fn trim(&self, messages: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut keep = vec![false; messages.len()];
        for (position, message) in messages.iter().enumerate() {
            if message.role == "system" {
                keep[position] = true;
            }
        }

        // Walk backwards, admitting whole messages until the budget runs
        // out. Everything older than the first non-fitting message is out.
        let mut window = Vec::new();
        let mut used = 0;
        for (position, message) in messages.iter().enumerate().rev() {
            if message.role == "system" {
                continue;
            }
            let cost = self.cost(message);
            if used + cost > self.budget {
                break;
            }
            used += cost;
            window.push(position);
        }
        window.reverse();

        let mut start = 0;
        if window.iter().any(|&p| messages[p].role == "user") {
            while start < window.len() && messages[window[start]].role == "assistant" {
                start += 1;
            }
        }
        for &position in &window[start..] {
            keep[position] = true;
        }

        messages
            .iter()
            .zip(keep)
            .filter_map(|(message, kept)| kept.then(|| message.clone()))
            .collect()
    }
}
