/* src/mover/ledger.rs */

use super::FileKey;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Untracked,
    Queued,
    InFlight,
    Completed,
}

/// In-memory record of which files are queued, being moved, or already moved.
/// Not persisted: after a restart anything still on the RAM disk is moved again.
pub struct Ledger {
    pending: HashMap<FileKey, FileState>,
    completed: LruCache<FileKey, ()>,
}

pub type SharedLedger = Arc<Mutex<Ledger>>;

impl Ledger {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Ledger {
            pending: HashMap::new(),
            completed: LruCache::new(capacity),
        }
    }

    pub fn shared(capacity: NonZeroUsize) -> SharedLedger {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Marks `key` as queued. Returns false when it is already queued, in flight, or completed.
    pub fn try_claim(&mut self, key: &FileKey) -> bool {
        if self.pending.contains_key(key) || self.completed.contains(key) {
            return false;
        }
        self.pending.insert(key.clone(), FileState::Queued);
        true
    }

    pub fn begin(&mut self, key: &FileKey) {
        if let Some(state) = self.pending.get_mut(key) {
            *state = FileState::InFlight;
        }
    }

    pub fn complete(&mut self, key: &FileKey) {
        self.pending.remove(key);
        self.completed.put(key.clone(), ());
    }

    // Failed attempt: the file becomes eligible again on the next tick.
    pub fn release(&mut self, key: &FileKey) {
        self.pending.remove(key);
    }

    pub fn state(&self, key: &FileKey) -> FileState {
        if let Some(state) = self.pending.get(key) {
            return *state;
        }
        if self.completed.contains(key) {
            FileState::Completed
        } else {
            FileState::Untracked
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }
}
