//! Durable FIFO of requests that could not be sent while offline.
//!
//! Draining snapshots the live queue, clears it, and replays entries in
//! original insertion order. Entries that fail with a retryable
//! classification are re-enqueued until they have been attempted
//! `MAX_REPLAY_ATTEMPTS` times; everything else is dropped. The JSON file
//! under the data dir is a best-effort mirror; the in-memory queue is
//! authoritative for the session.

use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use parley_schema::QueuedRequest;

/// Retry ceiling per queued entry. Reaching it drops the entry permanently.
pub const MAX_REPLAY_ATTEMPTS: u32 = 3;

/// What the replay function reports back per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Delivered,
    Retryable,
    Fatal,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub requeued: usize,
    pub dropped: usize,
}

pub struct OfflineQueue {
    pending: Mutex<VecDeque<QueuedRequest>>,
    path: PathBuf,
}

impl OfflineQueue {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            path: data_dir.join("offline_queue.json"),
        }
    }

    /// Restore the persisted mirror; a missing or corrupt file starts empty.
    pub fn load(&self) {
        let restored: VecDeque<QueuedRequest> = match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => return,
        };
        let mut pending = self.pending.lock().expect("queue lock poisoned");
        *pending = restored;
    }

    pub fn len(&self) -> usize {
        self.pending.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn enqueue(&self, request: QueuedRequest) {
        tracing::info!(id = %request.id, endpoint = %request.endpoint, "queueing request for offline replay");
        {
            let mut pending = self.pending.lock().expect("queue lock poisoned");
            pending.push_back(request);
        }
        self.persist().await;
    }

    /// Snapshot the queue, clear it, and replay each entry in insertion
    /// order through `replay`. Retryable failures below the attempt ceiling
    /// go back on the queue; the rest are dropped.
    pub async fn drain<F, Fut>(&self, mut replay: F) -> DrainReport
    where
        F: FnMut(QueuedRequest) -> Fut,
        Fut: Future<Output = ReplayOutcome>,
    {
        let snapshot: Vec<QueuedRequest> = {
            let mut pending = self.pending.lock().expect("queue lock poisoned");
            std::mem::take(&mut *pending).into()
        };

        if snapshot.is_empty() {
            return DrainReport::default();
        }
        tracing::debug!(entries = snapshot.len(), "draining offline queue");

        let mut report = DrainReport::default();
        for mut request in snapshot {
            match replay(request.clone()).await {
                ReplayOutcome::Delivered => report.delivered += 1,
                ReplayOutcome::Retryable => {
                    request.retry_count += 1;
                    if request.retry_count < MAX_REPLAY_ATTEMPTS {
                        let mut pending = self.pending.lock().expect("queue lock poisoned");
                        pending.push_back(request);
                        report.requeued += 1;
                    } else {
                        tracing::warn!(id = %request.id, "dropping queued request after {MAX_REPLAY_ATTEMPTS} attempts");
                        report.dropped += 1;
                    }
                }
                ReplayOutcome::Fatal => {
                    tracing::warn!(id = %request.id, "dropping queued request after fatal replay error");
                    report.dropped += 1;
                }
            }
        }

        self.persist().await;
        report
    }

    /// Write the JSON mirror. Failures are logged and swallowed.
    pub async fn persist(&self) {
        let snapshot: VecDeque<QueuedRequest> = {
            let pending = self.pending.lock().expect("queue lock poisoned");
            pending.clone()
        };
        if let Err(e) = self.write_mirror(&snapshot).await {
            tracing::warn!("failed to persist offline queue: {e}");
        }
    }

    async fn write_mirror(&self, snapshot: &VecDeque<QueuedRequest>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_schema::DispatchOptions;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;
    use uuid::Uuid;

    fn request(tag: &str) -> QueuedRequest {
        QueuedRequest::new(
            Uuid::new_v4(),
            "/functions/v1/claude-proxy",
            json!({"tag": tag}),
            DispatchOptions::default(),
        )
    }

    fn temp_queue() -> (tempfile::TempDir, OfflineQueue) {
        let dir = tempfile::tempdir().unwrap();
        let queue = OfflineQueue::new(dir.path());
        (dir, queue)
    }

    #[tokio::test]
    async fn drain_replays_in_insertion_order() {
        let (_dir, queue) = temp_queue();
        for tag in ["first", "second", "third"] {
            queue.enqueue(request(tag)).await;
        }

        let seen = Arc::new(AsyncMutex::new(Vec::new()));
        let seen_inner = Arc::clone(&seen);
        let report = queue
            .drain(move |req| {
                let seen = Arc::clone(&seen_inner);
                async move {
                    seen.lock().await.push(req.payload["tag"].as_str().unwrap().to_string());
                    ReplayOutcome::Delivered
                }
            })
            .await;

        assert_eq!(report.delivered, 3);
        assert_eq!(queue.len(), 0);
        assert_eq!(*seen.lock().await, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn retryable_failures_requeue_until_ceiling() {
        let (_dir, queue) = temp_queue();
        queue.enqueue(request("stubborn")).await;

        // Attempts 1 and 2 re-enqueue, attempt 3 drops.
        for expected_len in [1usize, 1, 0] {
            let report = queue.drain(|_req| async { ReplayOutcome::Retryable }).await;
            assert_eq!(queue.len(), expected_len);
            if expected_len == 0 {
                assert_eq!(report.dropped, 1);
            } else {
                assert_eq!(report.requeued, 1);
            }
        }

        // A dropped entry never reappears on later drains.
        let report = queue.drain(|_req| async { ReplayOutcome::Delivered }).await;
        assert_eq!(report, DrainReport::default());
    }

    #[tokio::test]
    async fn fatal_failures_drop_immediately() {
        let (_dir, queue) = temp_queue();
        queue.enqueue(request("bad")).await;

        let report = queue.drain(|_req| async { ReplayOutcome::Fatal }).await;
        assert_eq!(report.dropped, 1);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn mixed_outcomes_preserve_survivor_order() {
        let (_dir, queue) = temp_queue();
        for tag in ["a", "b", "c"] {
            queue.enqueue(request(tag)).await;
        }

        // "b" is delivered, the others are retried.
        let report = queue
            .drain(|req| async move {
                if req.payload["tag"] == "b" {
                    ReplayOutcome::Delivered
                } else {
                    ReplayOutcome::Retryable
                }
            })
            .await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.requeued, 2);

        let seen = Arc::new(AsyncMutex::new(Vec::new()));
        let seen_inner = Arc::clone(&seen);
        queue
            .drain(move |req| {
                let seen = Arc::clone(&seen_inner);
                async move {
                    seen.lock().await.push(req.payload["tag"].as_str().unwrap().to_string());
                    ReplayOutcome::Delivered
                }
            })
            .await;
        assert_eq!(*seen.lock().await, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn persist_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let queue = OfflineQueue::new(dir.path());
        queue.enqueue(request("kept")).await;

        let restored = OfflineQueue::new(dir.path());
        restored.load();
        assert_eq!(restored.len(), 1);
    }
}
