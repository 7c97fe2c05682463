//! Append-only per-session log buffer (§3 "Log buffer", invariant P1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub producer: String,
    pub severity: LogSeverity,
    pub text: String,
}

/// Append-only, never-truncated-during-a-live-workflow log. Both structured
/// step entries from the engine and raw streamed lines from the sandbox
/// executor land in the same ordered sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogBuffer {
    entries: Vec<LogEntry>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn append(&mut self, producer: impl Into<String>, severity: LogSeverity, text: impl Into<String>) -> usize {
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            producer: producer.into(),
            severity,
            text: text.into(),
        });
        self.entries.len() - 1
    }

    pub fn info(&mut self, producer: impl Into<String>, text: impl Into<String>) -> usize {
        self.append(producer, LogSeverity::Info, text)
    }

    pub fn warn(&mut self, producer: impl Into<String>, text: impl Into<String>) -> usize {
        self.append(producer, LogSeverity::Warn, text)
    }

    pub fn error(&mut self, producer: impl Into<String>, text: impl Into<String>) -> usize {
        self.append(producer, LogSeverity::Error, text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries strictly after `from_index`, for a reconnecting consumer
    /// resuming from its last-seen index (P1, scenario 6).
    pub fn since(&self, from_index: usize) -> &[LogEntry] {
        if from_index >= self.entries.len() {
            &[]
        } else {
            &self.entries[from_index..]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_stable_growing_indices() {
        let mut buf = LogBuffer::new();
        let i0 = buf.info("engine", "start");
        let i1 = buf.warn("engine", "retry");
        assert_eq!(i0, 0);
        assert_eq!(i1, 1);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn since_resumes_from_last_seen_index() {
        let mut buf = LogBuffer::new();
        for n in 0..12 {
            buf.info("engine", format!("step {n}"));
        }
        let tail = buf.since(10);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].text, "step 10");
        assert_eq!(tail[1].text, "step 11");
    }

    #[test]
    fn since_beyond_len_returns_empty() {
        let mut buf = LogBuffer::new();
        buf.info("engine", "only entry");
        assert!(buf.since(50).is_empty());
    }
}
