//! Pending-task storage.
//!
//! At most one live task per user: a second upload before the first is
//! resolved replaces it, and [`TaskStore::put`] hands the displaced entry
//! back so the orchestrator can reclaim its downloaded file instead of
//! leaking it. Entries expire after a TTL and read as absent afterwards —
//! same observable behaviour as a process restart, which also empties the
//! default in-memory store. Callers must treat "no task" as a normal
//! outcome, not an error.

use crate::task::ports::{MessageId, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A document waiting for the user's accept/cancel decision.
#[derive(Debug, Clone)]
pub struct PendingTask {
    /// Downloaded file; owned by the task, deleted when the task ends.
    pub file_path: PathBuf,
    /// Original upload name, used for the deck name.
    pub file_name: String,
    /// Recovered document text.
    pub extracted_text: String,
    /// Status message edited in place while processing.
    pub message_id: MessageId,
    pub page_count: usize,
    pub ocr_used: bool,
    /// Content hash, when computed (keys the extraction cache).
    pub file_hash: Option<String>,
}

/// Keyed single-slot task storage with TTL semantics.
///
/// The trait exists so the in-memory map can be swapped for a cache or a
/// durable table without touching the orchestrator.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// The live task for `user`, if any. Expired entries read as absent.
    async fn get(&self, user: UserId) -> Option<PendingTask>;

    /// Store `task` for `user`, returning the entry it displaced.
    async fn put(&self, user: UserId, task: PendingTask) -> Option<PendingTask>;

    /// Remove and return the live task for `user`.
    async fn delete(&self, user: UserId) -> Option<PendingTask>;
}

/// Process-local [`TaskStore`]; nothing survives a restart, by design.
pub struct InMemoryTaskStore {
    ttl: Duration,
    entries: Mutex<HashMap<UserId, (PendingTask, Instant)>>,
}

impl InMemoryTaskStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn is_expired(&self, stored_at: Instant) -> bool {
        stored_at.elapsed() >= self.ttl
    }
}

impl Default for InMemoryTaskStore {
    /// One hour: long enough to read a cost estimate, short enough that
    /// abandoned uploads do not pile up.
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, user: UserId) -> Option<PendingTask> {
        let mut entries = self.entries.lock().await;
        match entries.get(&user) {
            Some((_, stored_at)) if self.is_expired(*stored_at) => {
                entries.remove(&user);
                None
            }
            Some((task, _)) => Some(task.clone()),
            None => None,
        }
    }

    async fn put(&self, user: UserId, task: PendingTask) -> Option<PendingTask> {
        let mut entries = self.entries.lock().await;
        // The displaced entry is returned even when expired: its downloaded
        // file still needs reclaiming.
        entries
            .insert(user, (task, Instant::now()))
            .map(|(previous, _)| previous)
    }

    async fn delete(&self, user: UserId) -> Option<PendingTask> {
        let mut entries = self.entries.lock().await;
        entries
            .remove(&user)
            .filter(|(_, stored_at)| !self.is_expired(*stored_at))
            .map(|(task, _)| task)
    }
}
