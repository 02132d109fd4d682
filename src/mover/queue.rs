/* src/mover/queue.rs */

use super::{Job, WorkItem};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

/// Unbounded FIFO shared by the controller (single producer) and the workers.
pub struct TransferQueue {
    tx: mpsc::UnboundedSender<Job>,
    rx: Mutex<mpsc::UnboundedReceiver<Job>>,
    accepting: AtomicBool,
    depth: AtomicUsize,
}

impl TransferQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        TransferQueue {
            tx,
            rx: Mutex::new(rx),
            accepting: AtomicBool::new(true),
            depth: AtomicUsize::new(0),
        }
    }

    /// Returns false once the queue has been closed.
    pub fn push(&self, item: WorkItem) -> bool {
        if !self.accepting.load(Ordering::SeqCst) {
            return false;
        }
        self.send(Job::Transfer(item))
    }

    fn send(&self, job: Job) -> bool {
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Waits at most `wait` for the next job.
    pub async fn pop(&self, wait: Duration) -> Option<Job> {
        let job = timeout(wait, async { self.rx.lock().await.recv().await })
            .await
            .ok()
            .flatten()?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(job)
    }

    /// Stops accepting work and appends one sentinel per worker.
    pub fn close_with_sentinels(&self, workers: usize) {
        self.accepting.store(false, Ordering::SeqCst);
        for _ in 0..workers {
            self.send(Job::Shutdown);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

impl Default for TransferQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mover::FileKey;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn item(name: &str) -> WorkItem {
        WorkItem {
            key: FileKey::new("cam0", name),
            src: PathBuf::from("/ram/cam0").join(name),
            dst: PathBuf::from("/sd/cam0").join(name),
        }
    }

    #[tokio::test]
    async fn pops_in_fifo_order() {
        let queue = TransferQueue::new();
        assert!(queue.push(item("a.jpg")));
        assert!(queue.push(item("b.jpg")));
        assert_eq!(queue.len(), 2);

        let wait = Duration::from_millis(50);
        assert_eq!(queue.pop(wait).await, Some(Job::Transfer(item("a.jpg"))));
        assert_eq!(queue.pop(wait).await, Some(Job::Transfer(item("b.jpg"))));
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn pop_gives_up_after_wait() {
        let queue = TransferQueue::new();
        let started = tokio::time::Instant::now();
        assert_eq!(queue.pop(Duration::from_millis(30)).await, None);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn closing_refuses_work_and_queues_sentinels() {
        let queue = TransferQueue::new();
        queue.close_with_sentinels(2);
        assert!(!queue.is_accepting());
        assert!(!queue.push(item("late.jpg")));

        let wait = Duration::from_millis(50);
        assert_eq!(queue.pop(wait).await, Some(Job::Shutdown));
        assert_eq!(queue.pop(wait).await, Some(Job::Shutdown));
        assert_eq!(queue.pop(wait).await, None);
    }

    #[tokio::test]
    async fn each_job_reaches_exactly_one_consumer() {
        let queue = Arc::new(TransferQueue::new());
        for i in 0..200 {
            queue.push(item(&format!("img{}.jpg", i)));
        }
        queue.close_with_sentinels(4);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(Job::Transfer(item)) =
                    queue.pop(Duration::from_secs(1)).await
                {
                    seen.push(item.key.file_name);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 200);
        assert_eq!(unique.len(), 200);
    }
}
