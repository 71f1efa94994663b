//! Local diagnostics ring buffer.
//!
//! Records per-exchange latency and request metadata, capped at the last
//! 100 entries. Local-only; nothing is shipped to a remote collector.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use parley_schema::UsageRecord;

const MAX_RECORDS: usize = 100;

pub struct UsageLog {
    records: Mutex<VecDeque<UsageRecord>>,
    path: PathBuf,
}

impl UsageLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            path: data_dir.join("usage.json"),
        }
    }

    pub fn load(&self) {
        let restored: VecDeque<UsageRecord> = match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => return,
        };
        let mut records = self.records.lock().expect("usage lock poisoned");
        *records = restored;
        while records.len() > MAX_RECORDS {
            records.pop_front();
        }
    }

    pub fn record(&self, record: UsageRecord) {
        tracing::debug!(
            session = %record.session_id,
            mode = record.mode.as_str(),
            latency_ms = record.response_time_ms,
            "recorded exchange"
        );
        let mut records = self.records.lock().expect("usage lock poisoned");
        if records.len() == MAX_RECORDS {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<UsageRecord> {
        let records = self.records.lock().expect("usage lock poisoned");
        records.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("usage lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the JSON mirror. Failures are logged and swallowed.
    pub async fn persist(&self) {
        let snapshot: VecDeque<UsageRecord> = {
            let records = self.records.lock().expect("usage lock poisoned");
            records.clone()
        };
        let result: anyhow::Result<()> = async {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let json = serde_json::to_string(&snapshot)?;
            tokio::fs::write(&self.path, json).await?;
            Ok(())
        }
        .await;
        if let Err(e) = result {
            tracing::warn!("failed to persist usage log: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_schema::{LinkSpeed, PracticeMode};
    use uuid::Uuid;

    fn record(latency: u64) -> UsageRecord {
        UsageRecord {
            session_id: Uuid::new_v4(),
            mode: PracticeMode::InterviewPractice,
            message_count: 4,
            response_time_ms: latency,
            at: Utc::now(),
            speed: LinkSpeed::Fast,
            platform: "native".into(),
        }
    }

    #[test]
    fn ring_buffer_caps_at_one_hundred() {
        let dir = tempfile::tempdir().unwrap();
        let log = UsageLog::new(dir.path());
        for i in 0..150 {
            log.record(record(i));
        }
        assert_eq!(log.len(), 100);
        // Oldest 50 were evicted; newest entry is latency 149.
        assert_eq!(log.recent(1)[0].response_time_ms, 149);
        let oldest = log.recent(100).last().unwrap().response_time_ms;
        assert_eq!(oldest, 50);
    }

    #[test]
    fn recent_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = UsageLog::new(dir.path());
        for i in 0..5 {
            log.record(record(i));
        }
        let recent = log.recent(3);
        let latencies: Vec<u64> = recent.iter().map(|r| r.response_time_ms).collect();
        assert_eq!(latencies, vec![4, 3, 2]);
    }

    #[tokio::test]
    async fn persist_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = UsageLog::new(dir.path());
        log.record(record(42));
        log.persist().await;

        let restored = UsageLog::new(dir.path());
        restored.load();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.recent(1)[0].response_time_ms, 42);
    }
}
