//! Chat log.
//!
//! A bounded, insertion-ordered history of chat lines. Once full, every new
//! line evicts the oldest one.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of retained lines.
pub const CHAT_LOG_CAPACITY: usize = 50;

/// Who a chat line came from, relative to this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// Sent by the local player.
    Own,
    /// Sent by another player.
    Other,
    /// Generated locally (connection state, joins, errors).
    System,
}

/// A chat line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Sender label. `System` lines use a fixed label.
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ChatKind,
}

impl ChatEntry {
    pub fn new(sender: &str, text: &str, kind: ChatKind) -> Self {
        ChatEntry {
            sender: sender.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn system(text: &str) -> Self {
        ChatEntry::new("System", text, ChatKind::System)
    }
}

#[derive(Debug, Clone)]
pub struct ChatLog {
    entries: VecDeque<ChatEntry>,
    capacity: usize,
    pushed: u64,
}

impl Default for ChatLog {
    fn default() -> Self {
        ChatLog::new(CHAT_LOG_CAPACITY)
    }
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        ChatLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            pushed: 0,
        }
    }

    /// Appends a line, evicting the oldest when over capacity.
    pub fn push(&mut self, entry: ChatEntry) {
        self.entries.push_back(entry);
        self.pushed += 1;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn push_system(&mut self, text: &str) {
        self.push(ChatEntry::system(text));
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ChatEntry> {
        self.entries.iter()
    }

    /// Number of lines ever pushed, evicted ones included.
    pub fn pushed(&self) -> u64 {
        self.pushed
    }

    /// Retained lines pushed after the log had seen `seen` lines.
    pub fn since(&self, seen: u64) -> impl Iterator<Item = &ChatEntry> {
        let fresh = self.pushed.saturating_sub(seen) as usize;
        let skip = self.entries.len().saturating_sub(fresh);
        self.entries.iter().skip(skip)
    }

    pub fn latest(&self) -> Option<&ChatEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_evicts_oldest_and_keeps_order() {
        let mut log = ChatLog::default();
        for i in 0..CHAT_LOG_CAPACITY {
            log.push(ChatEntry::new("bob", &format!("line {i}"), ChatKind::Other));
        }
        assert_eq!(log.len(), 50);

        log.push(ChatEntry::new("ann", "line 50", ChatKind::Own));
        assert_eq!(log.len(), 50);

        let texts: Vec<_> = log.iter().map(|e| e.text.clone()).collect();
        let expected: Vec<_> = (1..=50).map(|i| format!("line {i}")).collect();
        assert_eq!(texts, expected);
        assert_eq!(log.latest().unwrap().kind, ChatKind::Own);
    }

    #[test]
    fn system_lines_use_system_kind() {
        let mut log = ChatLog::new(2);
        log.push_system("Connection closed");
        let line = log.latest().unwrap();
        assert_eq!(line.kind, ChatKind::System);
        assert_eq!(line.sender, "System");
    }

    #[test]
    fn since_skips_seen_and_evicted_lines() {
        let mut log = ChatLog::new(3);
        log.push_system("a");
        let seen = log.pushed();
        for t in ["b", "c", "d", "e"] {
            log.push_system(t);
        }
        let fresh: Vec<_> = log.since(seen).map(|e| e.text.as_str()).collect();
        assert_eq!(fresh, vec!["c", "d", "e"]);
        assert_eq!(log.since(log.pushed()).count(), 0);
    }
}
