/* src/mover/stats.rs */

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct Stats {
    pub enqueued: Arc<AtomicU64>,
    pub moved: Arc<AtomicU64>,
    pub moved_bytes: Arc<AtomicU64>,
    pub retained: Arc<AtomicU64>,
    pub failed: Arc<AtomicU64>,
    started: Instant,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            enqueued: Arc::default(),
            moved: Arc::default(),
            moved_bytes: Arc::default(),
            retained: Arc::default(),
            failed: Arc::default(),
            started: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub enqueued: u64,
    pub moved: u64,
    pub moved_bytes: u64,
    pub retained: u64,
    pub failed: u64,
}

impl Stats {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            moved: self.moved.load(Ordering::Relaxed),
            moved_bytes: self.moved_bytes.load(Ordering::Relaxed),
            retained: self.retained.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self, queue_depth: usize) {
        let snap = self.snapshot();
        let elapsed = self.started.elapsed();
        let rate = if elapsed.as_secs_f64() < 1e-6 {
            "N/A".to_string()
        } else {
            format!(
                "{}/s",
                format_bytes((snap.moved_bytes as f64 / elapsed.as_secs_f64()) as u64)
            )
        };
        info!(
            "> moved: {} ({}) | retained: {} | failed: {} | queued: {} | avg: {} | up: {:.0?}",
            snap.moved,
            format_bytes(snap.moved_bytes),
            snap.retained,
            snap.failed,
            queue_depth,
            rate,
            elapsed
        );
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}
