/* src/mover/worker.rs */

use super::ledger::SharedLedger;
use super::queue::TransferQueue;
use super::stats::Stats;
use super::verify::verify_copy_blocking;
use super::{Job, StopSignal, WorkItem};
use crate::error::TransferError;
use crate::setup::config::VerifyMode;
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Everything a worker shares with the controller.
pub struct WorkerContext {
    pub queue: Arc<TransferQueue>,
    pub ledger: SharedLedger,
    pub stats: Stats,
    pub stop: StopSignal,
    pub pop_timeout: Duration,
    pub verify: VerifyMode,
    /// Deletes a verified source; `remove_source` outside of tests.
    pub remove: fn(&Path) -> io::Result<()>,
}

pub fn remove_source(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Moved { bytes: u64 },
    /// Destination verified but the source could not be removed; retried next tick.
    SourceRetained { bytes: u64 },
    LeftForRetry,
}

struct Copied {
    bytes: u64,
    removal: io::Result<()>,
}

pub async fn run_worker_task(worker_id: usize, ctx: Arc<WorkerContext>) {
    info!("> Worker {} started.", worker_id);
    while !ctx.stop.is_raised() {
        match ctx.queue.pop(ctx.pop_timeout).await {
            None => continue,
            Some(Job::Shutdown) => {
                debug!("> Worker {} received shutdown sentinel.", worker_id);
                break;
            }
            Some(Job::Transfer(item)) => {
                process_item(worker_id, &ctx, item).await;
            }
        }
    }
    info!("> Worker {} stopped.", worker_id);
}

/// Copy, verify, then delete. The source is only removed after the copy checks out.
pub async fn process_item(worker_id: usize, ctx: &WorkerContext, item: WorkItem) -> Outcome {
    ctx.ledger.lock().await.begin(&item.key);

    let verify = ctx.verify;
    let remove = ctx.remove;
    let job = item.clone();
    let result = tokio::task::spawn_blocking(move || transfer_blocking(&job, verify, remove))
        .await
        .map_err(TransferError::from)
        .and_then(|r| r);

    match result {
        Ok(Copied {
            bytes,
            removal: Ok(()),
        }) => {
            ctx.ledger.lock().await.complete(&item.key);
            ctx.stats.moved.fetch_add(1, Ordering::Relaxed);
            ctx.stats.moved_bytes.fetch_add(bytes, Ordering::Relaxed);
            debug!("+ Worker {}: Transferred {}", worker_id, item.key);
            Outcome::Moved { bytes }
        }
        Ok(Copied {
            bytes,
            removal: Err(e),
        }) => {
            // only a removed source counts as moved; the next copy overwrites the same bytes
            ctx.ledger.lock().await.release(&item.key);
            ctx.stats.retained.fetch_add(1, Ordering::Relaxed);
            warn!(
                "! Worker {}: Copied {} but could not remove source '{}', will retry: {}",
                worker_id,
                item.key,
                item.src.display(),
                e
            );
            Outcome::SourceRetained { bytes }
        }
        Err(e) => {
            ctx.ledger.lock().await.release(&item.key);
            ctx.stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                "! Worker {}: Transfer failed, file will be retried: {}",
                worker_id, e
            );
            Outcome::LeftForRetry
        }
    }
}

// NOTE: This is a BLOCKING function and should be run via `tokio::task::spawn_blocking`.
fn transfer_blocking(
    item: &WorkItem,
    verify: VerifyMode,
    remove: fn(&Path) -> io::Result<()>,
) -> Result<Copied, TransferError> {
    let src_meta = fs::metadata(&item.src).map_err(|source| TransferError::Metadata {
        path: item.src.clone(),
        source,
    })?;

    fs::copy(&item.src, &item.dst).map_err(|source| TransferError::Copy {
        src: item.src.clone(),
        dst: item.dst.clone(),
        source,
    })?;
    if let Err(e) = preserve_modified(&item.dst, &src_meta) {
        debug!(
            "! Could not carry modification time over to '{}': {}",
            item.dst.display(),
            e
        );
    }

    // Re-read the source so a frame still being written fails the size check.
    let src_len = fs::metadata(&item.src)
        .map_err(|source| TransferError::Metadata {
            path: item.src.clone(),
            source,
        })?
        .len();
    verify_copy_blocking(&item.src, src_len, &item.dst, verify)?;

    Ok(Copied {
        bytes: src_len,
        removal: remove(&item.src),
    })
}

fn preserve_modified(dst: &Path, src_meta: &fs::Metadata) -> io::Result<()> {
    let modified = src_meta.modified()?;
    fs::File::options()
        .write(true)
        .open(dst)?
        .set_modified(modified)
}
