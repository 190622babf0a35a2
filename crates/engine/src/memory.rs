//! Deferred replies.
//!
//! Some decompositions are marked memory-worthy: when they match, a reply
//! is synthesized and parked here instead of being spoken. A later turn
//! with no matching keyword drains the oldest one.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Queue capacity used unless configured otherwise.
pub const DEFAULT_MEMORY_CAPACITY: usize = 20;

/// Bounded FIFO of pending replies. When full, new candidates are refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryQueue {
    capacity: usize,
    items: VecDeque<String>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

impl MemoryQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::new(),
        }
    }

    /// Park a reply. Returns `false` (and drops it) if the queue is full.
    pub fn feed(&mut self, reply: String) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push_back(reply);
        true
    }

    /// Take the oldest parked reply.
    pub fn drain(&mut self) -> Option<String> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
