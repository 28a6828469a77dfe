//! Per-conversation typing indicator state.
//!
//! Nothing here is persisted. Finished entries (`is_typing == false`) stay
//! visible for `idle_ttl` so a poller can observe the final chunk, after
//! which [`TypingTracker::prune_idle`] evicts them.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TypingState {
    pub is_typing: bool,
    pub chunk_index: usize,
    pub chunk_total: usize,
    pub last_update: DateTime<Utc>,
}

struct Entry {
    state: TypingState,
    touched: Instant,
}

pub struct TypingTracker {
    entries: Mutex<HashMap<String, Entry>>,
    idle_ttl: Duration,
}

impl TypingTracker {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Generation has begun; no chunk exists yet.
    pub fn set_start(&self, conversation_id: &str) {
        self.put(conversation_id, true, 0, 0);
    }

    /// The reply has been split; `total` chunks are on their way.
    pub fn set_total(&self, conversation_id: &str, total: usize) {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let entry = entries
            .entry(conversation_id.to_owned())
            .or_insert_with(|| Entry {
                state: TypingState {
                    is_typing: true,
                    chunk_index: 0,
                    chunk_total: 0,
                    last_update: Utc::now(),
                },
                touched: now,
            });
        entry.state.is_typing = true;
        entry.state.chunk_total = total;
        entry.state.last_update = Utc::now();
        entry.touched = now;
    }

    /// Chunk `index` of `total` has been stored.
    pub fn update(&self, conversation_id: &str, index: usize, total: usize) {
        self.put(conversation_id, index + 1 < total, index, total);
    }

    pub fn get(&self, conversation_id: &str) -> Option<TypingState> {
        let entries = self.entries.lock();
        let entry = entries.get(conversation_id)?;
        if self.expired(entry) {
            return None;
        }
        Some(entry.state)
    }

    /// The reply was cut short: keep the last position but stop typing.
    pub fn stop(&self, conversation_id: &str) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(conversation_id) {
            entry.state.is_typing = false;
            entry.state.last_update = Utc::now();
            entry.touched = Instant::now();
        }
    }

    /// Drop the entry immediately (failed generation).
    pub fn clear(&self, conversation_id: &str) {
        self.entries.lock().remove(conversation_id);
    }

    /// Evict finished entries older than the idle TTL. Returns how many
    /// entries were removed.
    pub fn prune_idle(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !self.expired(e));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put(&self, conversation_id: &str, is_typing: bool, chunk_index: usize, chunk_total: usize) {
        self.entries.lock().insert(
            conversation_id.to_owned(),
            Entry {
                state: TypingState {
                    is_typing,
                    chunk_index,
                    chunk_total,
                    last_update: Utc::now(),
                },
                touched: Instant::now(),
            },
        );
    }

    fn expired(&self, entry: &Entry) -> bool {
        !entry.state.is_typing && entry.touched.elapsed() >= self.idle_ttl
    }
}
