/* src/mover/mod.rs */

use std::fmt;
use std::path::PathBuf;
use tokio::sync::watch;

pub mod controller;
pub mod ledger;
pub mod queue;
pub mod scanner;
pub mod stats;
pub mod verify;
pub mod worker;

/// Identifies one frame across sessions. Frame counters may restart per run,
/// so the bare file name is not unique on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileKey {
    pub session: String,
    pub file_name: String,
}

impl FileKey {
    pub fn new(session: impl Into<String>, file_name: impl Into<String>) -> Self {
        FileKey {
            session: session.into(),
            file_name: file_name.into(),
        }
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session, self.file_name)
    }
}

/// One file to move from the RAM disk to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub key: FileKey,
    pub src: PathBuf,
    pub dst: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Transfer(WorkItem),
    /// Sentinel: the worker that pops it exits.
    Shutdown,
}

/// Raised once; never lowered.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: watch::Sender<bool>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        StopSignal { tx }
    }

    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    // Resolves immediately if the signal was already raised.
    pub async fn raised(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|raised| *raised).await;
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
