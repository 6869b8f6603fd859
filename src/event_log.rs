use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogKind {
    Info,
    Damage,
    Milestone,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub kind: LogKind,
    pub message: String,
}

/// Bounded, ordered log of what the viewer has been shown.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    /// Appends an entry, evicting the oldest one when full.
    pub fn push(&mut self, kind: LogKind, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            seq: self.next_seq,
            kind,
            message: message.into(),
        };
        self.next_seq += 1;

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        entry
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of entries ever appended, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.next_seq
    }

    pub fn contains_message(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_evicts_oldest_and_keeps_sequence() {
        let mut log = EventLog::new(2);
        log.push(LogKind::Milestone, "start");
        log.push(LogKind::Info, "a");
        let last = log.push(LogKind::Damage, "b");

        assert_eq!(last.seq, 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.total_appended(), 3);
        assert_eq!(
            log.entries().map(|e| e.message.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert!(!log.contains_message("start"));
    }
}
