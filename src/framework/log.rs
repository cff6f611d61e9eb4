//! Capped activity log published inside every simulator snapshot.
//!
//! The log is purely observational: simulation logic never reads it back.
//! It is append-only and keeps the most recent [`LOG_CAPACITY`] entries,
//! evicting the oldest first.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum number of retained entries.
pub const LOG_CAPACITY: usize = 100;

/// Severity/kind tag on a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogKind {
    Info,
    Success,
    Error,
}

/// One observational event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Milliseconds since the unix epoch at append time.
    pub timestamp_ms: u64,
    pub kind: LogKind,
    pub message: String,
}

/// Append-only ring of the most recent [`LOG_CAPACITY`] entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, evicting the oldest once the cap is reached.
    pub fn push(&mut self, kind: LogKind, message: impl Into<String>) {
        if self.entries.len() == LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            timestamp_ms: now_ms(),
            kind,
            message: message.into(),
        });
    }

    /// Entries oldest-first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Milliseconds since the unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_most_recent_hundred_entries() {
        let mut log = ActivityLog::new();
        for i in 0..150 {
            log.push(LogKind::Info, format!("event {i}"));
        }
        assert_eq!(log.len(), LOG_CAPACITY);
        // Oldest evicted first: the first retained entry is event 50.
        assert_eq!(log.entries().next().unwrap().message, "event 50");
        assert_eq!(log.entries().last().unwrap().message, "event 149");
    }

    #[test]
    fn entries_carry_kind_and_timestamp() {
        let mut log = ActivityLog::new();
        log.push(LogKind::Error, "boom");
        let entry = log.entries().next().unwrap();
        assert_eq!(entry.kind, LogKind::Error);
        assert!(entry.timestamp_ms > 0);
    }
}
