//! Content-hash deduplication with TTL-based expiry.
//!
//! Keyed on `(worker_id, sha256(content))`. A call within the TTL window of
//! a prior identical call is reported as a duplicate; once the window
//! lapses the same content is accepted again.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// Default time-to-live for a deduplication entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

fn hash_content(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// A TTL-windowed content deduplicator.
pub struct Deduplicator {
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), Instant>>,
}

impl Deduplicator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if `(worker_id, content)` was already seen within the
    /// TTL window; otherwise records it and returns `false`.
    pub async fn is_duplicate(&self, worker_id: &str, content: &str) -> bool {
        let key = (worker_id.to_string(), hash_content(content));
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, expiry| *expiry > now);
        if let Some(expiry) = entries.get(&key) {
            if *expiry > now {
                return true;
            }
        }
        entries.insert(key, now + self.ttl);
        false
    }

    /// The number of currently unexpired entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, expiry| *expiry > now);
        entries.len()
    }

    /// Discard all entries.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_occurrence_is_not_a_duplicate() {
        let dedup = Deduplicator::new(Duration::from_secs(30));
        assert!(!dedup.is_duplicate("worker-1", "hello").await);
    }

    #[tokio::test]
    async fn repeated_content_within_ttl_is_a_duplicate() {
        let dedup = Deduplicator::new(Duration::from_secs(30));
        assert!(!dedup.is_duplicate("worker-1", "hello").await);
        assert!(dedup.is_duplicate("worker-1", "hello").await);
    }

    #[tokio::test]
    async fn distinct_workers_are_independent() {
        let dedup = Deduplicator::new(Duration::from_secs(30));
        assert!(!dedup.is_duplicate("worker-1", "hello").await);
        assert!(!dedup.is_duplicate("worker-2", "hello").await);
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let dedup = Deduplicator::new(Duration::from_millis(10));
        assert!(!dedup.is_duplicate("worker-1", "hello").await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!dedup.is_duplicate("worker-1", "hello").await);
    }

    #[tokio::test]
    async fn clear_removes_all_entries() {
        let dedup = Deduplicator::new(Duration::from_secs(30));
        dedup.is_duplicate("worker-1", "hello").await;
        dedup.clear().await;
        assert_eq!(dedup.len().await, 0);
    }
}
