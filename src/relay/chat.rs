//! Chat history ring buffer

use std::collections::VecDeque;

use crate::protocol::ChatMessage;

/// Default number of retained chat messages
pub const DEFAULT_CHAT_HISTORY: usize = 50;

/// Fixed-capacity FIFO of recent chat, replayed to new players
#[derive(Debug)]
pub struct ChatHistory {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
}

impl ChatHistory {
    /// Create an empty history. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message, evicting the oldest ones past capacity.
    /// Returns the number of evicted messages.
    pub fn push(&mut self, message: ChatMessage) -> usize {
        self.messages.push_back(message);
        let mut evicted = 0;
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Messages oldest-first
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_HISTORY)
    }
}
