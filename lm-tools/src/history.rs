//! Bounded, insertion-ordered conversation history.

use chrono::{DateTime, Utc};
use lm_llm::{LlmError, Result, Role};
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// FIFO with a hard cap: once full, every append evicts the oldest message.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    messages: VecDeque<HistoryMessage>,
    max_history: usize,
}

impl MessageHistory {
    pub fn new(max_history: usize) -> Result<Self> {
        if max_history == 0 {
            return Err(LlmError::InvalidInput(
                "max_history must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            messages: VecDeque::with_capacity(max_history.min(DEFAULT_MAX_HISTORY)),
            max_history,
        })
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.push(HistoryMessage::new(role, content));
    }

    pub fn push(&mut self, message: HistoryMessage) {
        while self.messages.len() >= self.max_history {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn messages(&self) -> impl Iterator<Item = &HistoryMessage> {
        self.messages.iter()
    }

    /// The trailing `n` messages, oldest first.
    pub fn last(&self, n: usize) -> impl Iterator<Item = &HistoryMessage> {
        self.messages.iter().skip(self.messages.len().saturating_sub(n))
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self {
            messages: VecDeque::new(),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}
