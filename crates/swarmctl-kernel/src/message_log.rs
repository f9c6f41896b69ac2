//! Append-only message log shared between the coordinator and workers.
//!
//! Every post goes through [`MessageLog::append`]; nothing is ever removed
//! or rewritten. Readers track their own unread watermark via
//! [`MessageLog::unread_for`] / [`MessageLog::mark_read`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

/// The channel recipient meaning "every reader".
pub const ALL: &str = "ALL";
/// The channel id of the coordinator itself.
pub const COORDINATOR: &str = "COORDINATOR";

/// Classifies the purpose of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Info,
    WorkerReady,
    Handoff,
    Request,
    Urgent,
}

/// One entry in the message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEntry {
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
    pub content: String,
    pub kind: MessageKind,
}

/// The shared, append-only message log.
#[derive(Default)]
pub struct MessageLog {
    entries: RwLock<Vec<MessageEntry>>,
    watermarks: Mutex<HashMap<String, usize>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new entry, timestamped now, and return a clone of it.
    pub async fn append(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> MessageEntry {
        let entry = MessageEntry {
            timestamp: Utc::now(),
            from: from.into(),
            to: to.into(),
            content: content.into(),
            kind,
        };
        let mut entries = self.entries.write().await;
        entries.push(entry.clone());
        entry
    }

    /// A snapshot of every entry ever appended, oldest first.
    pub async fn entries(&self) -> Vec<MessageEntry> {
        self.entries.read().await.clone()
    }

    /// The total number of entries appended so far.
    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Entries addressed to `agent_id` (directly, or via [`ALL`]) since its
    /// last [`mark_read`] call.
    ///
    /// [`mark_read`]: MessageLog::mark_read
    pub async fn unread_for(&self, agent_id: &str) -> Vec<MessageEntry> {
        let watermark = *self.watermarks.lock().await.get(agent_id).unwrap_or(&0);
        let entries = self.entries.read().await;
        entries
            .iter()
            .skip(watermark)
            .filter(|e| e.to == agent_id || e.to == ALL)
            .cloned()
            .collect()
    }

    /// Advance `agent_id`'s watermark to the current tail of the log.
    pub async fn mark_read(&self, agent_id: &str) {
        let tail = self.entries.read().await.len();
        self.watermarks
            .lock()
            .await
            .insert(agent_id.to_string(), tail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_increments_count() {
        let log = MessageLog::new();
        log.append("worker-1", ALL, "hello", MessageKind::Info).await;
        assert_eq!(log.count().await, 1);
    }

    #[tokio::test]
    async fn unread_for_filters_by_recipient_and_all() {
        let log = MessageLog::new();
        log.append(COORDINATOR, "worker-1", "assignment", MessageKind::Info)
            .await;
        log.append(COORDINATOR, "worker-2", "assignment", MessageKind::Info)
            .await;
        log.append("worker-1", ALL, "ready", MessageKind::WorkerReady)
            .await;

        let unread = log.unread_for("worker-1").await;
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].to, "worker-1");
        assert_eq!(unread[1].to, ALL);
    }

    #[tokio::test]
    async fn mark_read_advances_watermark() {
        let log = MessageLog::new();
        log.append(COORDINATOR, "worker-1", "a", MessageKind::Info)
            .await;
        log.mark_read("worker-1").await;
        log.append(COORDINATOR, "worker-1", "b", MessageKind::Info)
            .await;

        let unread = log.unread_for("worker-1").await;
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].content, "b");
    }
}
