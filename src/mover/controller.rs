/* src/mover/controller.rs */

use super::ledger::{Ledger, SharedLedger};
use super::queue::TransferQueue;
use super::scanner::{self, Scanner};
use super::stats::Stats;
use super::worker::{remove_source, run_worker_task, WorkerContext};
use super::{FileKey, StopSignal, WorkItem};
use crate::error::{Error, Result};
use crate::setup::check;
use crate::setup::config::TransferConfig;
use log::{debug, info, warn};
use std::num::NonZeroUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Running,
    Stopping,
}

/// Lets a supervisor stop a running transfer from another task.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop: StopSignal,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stop.raise();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub workers_joined: usize,
    /// Workers still busy when their join timeout expired; they finish detached.
    pub workers_abandoned: usize,
}

/// Drains `<ramdisk_root>/<session>/*.<ext>` into `<storage_root>/<session>/`.
pub struct RamDiskTransfer {
    cfg: TransferConfig,
    scanner: Scanner,
    queue: Arc<TransferQueue>,
    ledger: SharedLedger,
    stats: Stats,
    stop: StopSignal,
    state: ControllerState,
    workers: Vec<JoinHandle<()>>,
}

impl RamDiskTransfer {
    /// Fails if either root is unusable; nothing runs until `start`.
    pub fn new(cfg: TransferConfig) -> Result<Self> {
        check::validate_transfer(&cfg)?;
        let capacity = NonZeroUsize::new(cfg.dedup_capacity)
            .ok_or_else(|| Error::invalid("dedup_capacity", "must be at least 1"))?;

        let mut scanner = Scanner::new(&cfg.ramdisk_root, &cfg.storage_root);
        scanner.scan();
        info!(
            "+ RAM disk transfer initialized. RAM: {}, SD: {}",
            cfg.ramdisk_root.display(),
            cfg.storage_root.display()
        );

        Ok(RamDiskTransfer {
            cfg,
            scanner,
            queue: Arc::new(TransferQueue::new()),
            ledger: Ledger::shared(capacity),
            stats: Stats::default(),
            stop: StopSignal::new(),
            state: ControllerState::Running,
            workers: Vec::new(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop: self.stop.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> ControllerState {
        self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Runs the poll loop until stopped, then drains the workers.
    pub async fn start(mut self) -> ShutdownReport {
        info!("> Starting RAM disk to SD card transfer process");
        self.spawn_workers();

        while !self.stop.is_raised() {
            let before = self.stats.snapshot().moved;
            self.tick().await;
            tokio::select! {
                _ = time::sleep(self.cfg.poll_interval()) => {}
                _ = self.stop.raised() => {}
            }
            if self.stats.snapshot().moved != before {
                self.stats.log_summary(self.queue.len());
            }
        }

        self.shutdown().await
    }

    fn worker_context(&self) -> WorkerContext {
        WorkerContext {
            queue: self.queue.clone(),
            ledger: self.ledger.clone(),
            stats: self.stats.clone(),
            stop: self.stop.clone(),
            pop_timeout: self.cfg.pop_timeout(),
            verify: self.cfg.verify,
            remove: remove_source,
        }
    }

    fn spawn_workers(&mut self) {
        let ctx = Arc::new(self.worker_context());
        for i in 0..self.cfg.workers {
            self.workers.push(tokio::spawn(run_worker_task(i + 1, ctx.clone())));
        }
    }

    /// One poll cycle: rescan, then enqueue unclaimed candidates oldest first.
    /// Returns the number of items enqueued.
    pub async fn tick(&mut self) -> usize {
        if self.state == ControllerState::Stopping {
            return 0;
        }
        self.scanner.scan();

        let mut enqueued = 0;
        let mut found_any = false;
        for session in self.scanner.sessions() {
            if self.stop.is_raised() {
                break;
            }
            if !session.src.exists() {
                continue;
            }
            let files = match scanner::candidates(
                session,
                &self.cfg.extension,
                self.cfg.max_files_per_batch,
            ) {
                Ok(files) => files,
                Err(e) => {
                    warn!("! Error listing files in {}: {}", session.name, e);
                    continue;
                }
            };
            if files.is_empty() {
                continue;
            }
            found_any = true;
            info!("> Found {} files in {} to transfer", files.len(), session.name);

            let mut ledger = self.ledger.lock().await;
            for file in files {
                if self.stop.is_raised() {
                    break;
                }
                let key = FileKey::new(session.name.as_str(), file.file_name.as_str());
                if !ledger.try_claim(&key) {
                    continue;
                }
                let item = WorkItem {
                    dst: session.dst.join(&file.file_name),
                    src: file.path,
                    key,
                };
                let key = item.key.clone();
                if self.queue.push(item) {
                    enqueued += 1;
                } else {
                    ledger.release(&key);
                }
            }
        }

        if !found_any {
            debug!("> No files to transfer at this time");
        }
        self.stats
            .enqueued
            .fetch_add(enqueued as u64, Ordering::Relaxed);
        enqueued
    }

    /// Raises the stop signal, sends one sentinel per worker, then joins the workers one
    /// at a time. `join_timeout` applies to each worker, so the worst case is
    /// `workers * join_timeout`.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        info!("> Stopping transfer process");
        self.state = ControllerState::Stopping;
        self.stop.raise();
        self.queue.close_with_sentinels(self.workers.len());

        let mut report = ShutdownReport {
            workers_joined: 0,
            workers_abandoned: 0,
        };
        for (i, handle) in self.workers.drain(..).enumerate() {
            match timeout(self.cfg.join_timeout(), handle).await {
                Ok(Ok(())) => report.workers_joined += 1,
                Ok(Err(e)) => {
                    warn!("! Worker {} ended abnormally: {}", i + 1, e);
                    report.workers_joined += 1;
                }
                Err(_) => {
                    warn!(
                        "! Worker {} still busy after {:?}, leaving it to finish",
                        i + 1,
                        self.cfg.join_timeout()
                    );
                    report.workers_abandoned += 1;
                }
            }
        }

        self.stats.log_summary(self.queue.len());
        info!("+ Transfer process stopped");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mover::worker::process_item;
    use crate::mover::Job;
    use crate::setup::config::VerifyMode;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Rig {
        _temp: TempDir,
        ram: PathBuf,
        storage: PathBuf,
    }

    fn rig() -> Rig {
        let temp = TempDir::new().unwrap();
        let ram = temp.path().join("ramdisk");
        let storage = temp.path().join("Images");
        fs::create_dir_all(&ram).unwrap();
        fs::create_dir_all(&storage).unwrap();
        Rig {
            _temp: temp,
            ram,
            storage,
        }
    }

    fn config(rig: &Rig) -> TransferConfig {
        TransferConfig {
            ramdisk_root: rig.ram.clone(),
            storage_root: rig.storage.clone(),
            poll_interval_secs: 0.05,
            pop_timeout_ms: 20,
            join_timeout_secs: 2.0,
            workers: 2,
            verify: VerifyMode::Checksum,
            ..TransferConfig::default()
        }
    }

    fn write_frames(dir: &Path, names: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for name in names {
            fs::write(dir.join(name), format!("jpeg:{}", name)).unwrap();
            std::thread::sleep(Duration::from_millis(15));
        }
    }

    async fn drain(queue: &TransferQueue) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(Job::Transfer(item)) = queue.pop(Duration::from_millis(20)).await {
            names.push(item.key.to_string());
        }
        names
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn unreachable_roots_fail_construction() {
        let rig = rig();
        let mut cfg = config(&rig);
        cfg.ramdisk_root = rig.ram.join("missing");
        assert!(matches!(
            RamDiskTransfer::new(cfg),
            Err(Error::RootUnreachable { role: "ramdisk", .. })
        ));

        let mut cfg = config(&rig);
        cfg.storage_root = rig.storage.join("missing");
        assert!(matches!(
            RamDiskTransfer::new(cfg),
            Err(Error::RootUnreachable { role: "storage", .. })
        ));
    }

    #[tokio::test]
    async fn tick_enqueues_oldest_first_and_never_twice() {
        let rig = rig();
        write_frames(
            &rig.ram.join("cam0_20240101"),
            &["img2.jpg", "img1.jpg", "img3.jpg"],
        );
        fs::write(rig.ram.join("cam0_20240101").join("meta.txt"), b"x").unwrap();

        let mut transfer = RamDiskTransfer::new(config(&rig)).unwrap();
        assert!(rig.storage.join("cam0_20240101").is_dir());

        assert_eq!(transfer.tick().await, 3);
        // still on the RAM disk and still claimed: nothing new to enqueue
        assert_eq!(transfer.tick().await, 0);

        assert_eq!(
            drain(&transfer.queue).await,
            [
                "cam0_20240101/img2.jpg",
                "cam0_20240101/img1.jpg",
                "cam0_20240101/img3.jpg"
            ]
        );
        assert_eq!(transfer.stats.snapshot().enqueued, 3);
    }

    #[tokio::test]
    async fn tick_respects_batch_size_per_directory() {
        let rig = rig();
        write_frames(&rig.ram.join("cam0"), &["a.jpg", "b.jpg", "c.jpg"]);
        write_frames(&rig.ram.join("cam1"), &["d.jpg", "e.jpg"]);
        let mut cfg = config(&rig);
        cfg.max_files_per_batch = 2;

        let mut transfer = RamDiskTransfer::new(cfg).unwrap();
        assert_eq!(transfer.tick().await, 4);
        assert_eq!(
            drain(&transfer.queue).await,
            ["cam0/a.jpg", "cam0/b.jpg", "cam1/d.jpg", "cam1/e.jpg"]
        );
    }

    #[tokio::test]
    async fn tick_skips_vanished_session_and_keeps_going() {
        let rig = rig();
        write_frames(&rig.ram.join("cam0"), &["a.jpg"]);
        write_frames(&rig.ram.join("cam1"), &["b.jpg"]);
        let mut transfer = RamDiskTransfer::new(config(&rig)).unwrap();

        fs::remove_dir_all(rig.ram.join("cam0")).unwrap();
        assert_eq!(transfer.tick().await, 1);
        assert_eq!(drain(&transfer.queue).await, ["cam1/b.jpg"]);
    }

    #[tokio::test]
    async fn sessions_created_after_start_are_picked_up() {
        let rig = rig();
        let mut transfer = RamDiskTransfer::new(config(&rig)).unwrap();
        assert_eq!(transfer.tick().await, 0);

        write_frames(&rig.ram.join("cam1_20240101"), &["f1.jpg"]);
        assert_eq!(transfer.tick().await, 1);
        assert!(rig.storage.join("cam1_20240101").is_dir());
    }

    #[tokio::test]
    async fn moves_session_frames_end_to_end() {
        let rig = rig();
        let session = rig.ram.join("cam0_20240101");
        write_frames(&session, &["img1.jpg", "img2.jpg"]);

        let transfer = RamDiskTransfer::new(config(&rig)).unwrap();
        let stop = transfer.stop_handle();
        let stats = transfer.stats().clone();
        let running = tokio::spawn(transfer.start());

        wait_until(|| stats.snapshot().moved == 2).await;
        stop.stop();
        let report = running.await.unwrap();

        assert_eq!(report.workers_joined, 2);
        assert_eq!(report.workers_abandoned, 0);
        for name in ["img1.jpg", "img2.jpg"] {
            assert!(!session.join(name).exists());
            assert_eq!(
                fs::read_to_string(rig.storage.join("cam0_20240101").join(name)).unwrap(),
                format!("jpeg:{}", name)
            );
        }
    }

    #[tokio::test]
    async fn failed_copy_is_retried_on_a_later_tick() {
        let rig = rig();
        let session = rig.ram.join("cam0_20240101");
        write_frames(&session, &["img3.jpg"]);
        let blocked = rig.storage.join("cam0_20240101").join("img3.jpg");

        let transfer = RamDiskTransfer::new(config(&rig)).unwrap();
        fs::create_dir(&blocked).unwrap();
        let stop = transfer.stop_handle();
        let stats = transfer.stats().clone();
        let running = tokio::spawn(transfer.start());

        wait_until(|| stats.snapshot().failed >= 2).await;
        assert!(session.join("img3.jpg").exists());

        fs::remove_dir(&blocked).unwrap();
        wait_until(|| stats.snapshot().moved == 1).await;
        stop.stop();
        running.await.unwrap();

        assert!(!session.join("img3.jpg").exists());
        assert_eq!(fs::read_to_string(&blocked).unwrap(), "jpeg:img3.jpg");
    }

    fn refuse_removal(_: &Path) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only mount",
        ))
    }

    async fn run_queued(ctx: &WorkerContext) -> usize {
        let mut ran = 0;
        while let Some(Job::Transfer(item)) = ctx.queue.pop(Duration::from_millis(20)).await {
            process_item(1, ctx, item).await;
            ran += 1;
        }
        ran
    }

    #[tokio::test]
    async fn undeleted_sources_are_retried_without_starving_the_session() {
        let rig = rig();
        let session = rig.ram.join("cam0");
        write_frames(&session, &["a.jpg", "b.jpg", "new.jpg"]);
        let mut cfg = config(&rig);
        cfg.max_files_per_batch = 2;
        let mut transfer = RamDiskTransfer::new(cfg).unwrap();

        let mut stuck = transfer.worker_context();
        stuck.remove = refuse_removal;
        assert_eq!(transfer.tick().await, 2);
        assert_eq!(run_queued(&stuck).await, 2);
        assert!(session.join("a.jpg").exists());
        assert!(session.join("b.jpg").exists());
        assert_eq!(transfer.stats.snapshot().retained, 2);

        // the oldest two come back instead of blocking the batch
        assert_eq!(transfer.tick().await, 2);
        let healthy = transfer.worker_context();
        assert_eq!(run_queued(&healthy).await, 2);
        assert!(!session.join("a.jpg").exists());
        assert!(!session.join("b.jpg").exists());

        assert_eq!(transfer.tick().await, 1);
        assert_eq!(run_queued(&healthy).await, 1);
        assert!(!session.join("new.jpg").exists());
        for name in ["a.jpg", "b.jpg", "new.jpg"] {
            assert_eq!(
                fs::read_to_string(rig.storage.join("cam0").join(name)).unwrap(),
                format!("jpeg:{}", name)
            );
        }
        assert_eq!(transfer.stats.snapshot().moved, 3);
    }

    #[tokio::test]
    async fn shutdown_joins_idle_workers_and_refuses_new_work() {
        let rig = rig();
        let mut transfer = RamDiskTransfer::new(config(&rig)).unwrap();
        transfer.spawn_workers();
        assert_eq!(transfer.state(), ControllerState::Running);

        let report = transfer.shutdown().await;
        assert_eq!(report.workers_joined, 2);
        assert_eq!(report.workers_abandoned, 0);
        assert_eq!(transfer.state(), ControllerState::Stopping);

        write_frames(&rig.ram.join("cam0"), &["late.jpg"]);
        assert_eq!(transfer.tick().await, 0);
        assert!(rig.ram.join("cam0").join("late.jpg").exists());
    }

    #[tokio::test]
    async fn stop_before_start_returns_promptly() {
        let rig = rig();
        let transfer = RamDiskTransfer::new(config(&rig)).unwrap();
        transfer.stop_handle().stop();
        let report = timeout(Duration::from_secs(3), transfer.start()).await.unwrap();
        assert_eq!(report.workers_joined, 2);
    }
}
