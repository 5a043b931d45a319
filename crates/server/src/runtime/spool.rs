//! Degraded-mode spool: an in-memory, disk-mirrored holding area the
//! per-app processor task (`crate::runtime::processor::run`) shunts
//! batches into once the durable store has failed ten consecutive writes
//! (§4.H).
//!
//! Bounded at a configurable byte cap with oldest-drop eviction, the same
//! policy the SDK's `RecordBuffer` uses for its in-process buffer — here
//! applied per app, with the queue mirrored to a single file on every
//! mutation so a crash during degraded mode does not lose what fit in the
//! cap.

use std::collections::VecDeque;
use std::path::PathBuf;

use logsentry_core::model::PersistedLog;
use parking_lot::Mutex;
use uuid::Uuid;

struct Inner {
    records: VecDeque<PersistedLog>,
    bytes: u64,
}

/// Per-app degraded-mode holding area, capped at `cap_bytes` with
/// oldest-drop eviction.
pub struct Spool {
    root: PathBuf,
    cap_bytes: u64,
    app_id: Uuid,
    inner: Mutex<Inner>,
}

impl Spool {
    pub fn new(root: PathBuf, cap_bytes: u64, app_id: Uuid) -> Self {
        Self {
            root,
            cap_bytes,
            app_id,
            inner: Mutex::new(Inner {
                records: VecDeque::new(),
                bytes: 0,
            }),
        }
    }

    /// Add a batch, evicting the oldest records if the cap is exceeded.
    pub fn push_batch(&self, batch: Vec<PersistedLog>) {
        let mut inner = self.inner.lock();
        for record in batch {
            let size = estimate_size(&record);
            inner.records.push_back(record);
            inner.bytes += size;
        }
        while inner.bytes > self.cap_bytes {
            let Some(dropped) = inner.records.pop_front() else {
                break;
            };
            inner.bytes = inner.bytes.saturating_sub(estimate_size(&dropped));
            tracing::warn!(
                app_id = %self.app_id,
                "spool over capacity, dropping oldest record"
            );
        }
        self.mirror_to_disk(&inner.records);
    }

    /// Remove and return everything currently spooled, for recovery replay.
    pub fn drain_all(&self) -> Vec<PersistedLog> {
        let mut inner = self.inner.lock();
        let drained: Vec<_> = inner.records.drain(..).collect();
        inner.bytes = 0;
        self.mirror_to_disk(&inner.records);
        drained
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    fn mirror_to_disk(&self, records: &VecDeque<PersistedLog>) {
        let path = self.root.join(format!("{}.spool.jsonl", self.app_id));
        let Ok(()) = std::fs::create_dir_all(&self.root) else {
            return;
        };
        let mut buf = Vec::new();
        for record in records {
            if serde_json::to_writer(&mut buf, record).is_ok() {
                buf.push(b'\n');
            }
        }
        let _ = std::fs::write(path, buf);
    }
}

fn estimate_size(record: &PersistedLog) -> u64 {
    serde_json::to_vec(record).map(|v| v.len() as u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use logsentry_core::model::Level;

    fn sample() -> PersistedLog {
        PersistedLog {
            id: Uuid::new_v4(),
            app_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            ingested_at: Utc::now(),
            level: Level::Error,
            service: "svc".into(),
            message: "x".repeat(100),
            attributes: Default::default(),
            fingerprint: "fp".into(),
            classification: None,
        }
    }

    fn temp_root() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("logsentry-spool-test-{}", Uuid::new_v4()));
        dir
    }

    #[test]
    fn push_then_drain_round_trips() {
        let root = temp_root();
        let spool = Spool::new(root.clone(), 1024 * 1024, Uuid::new_v4());
        spool.push_batch(vec![sample(), sample()]);
        assert!(!spool.is_empty());
        let drained = spool.drain_all();
        assert_eq!(drained.len(), 2);
        assert!(spool.is_empty());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn oldest_dropped_when_over_cap() {
        let root = temp_root();
        let one_record_size = estimate_size(&sample());
        let spool = Spool::new(root.clone(), one_record_size + 1, Uuid::new_v4());
        for _ in 0..5 {
            spool.push_batch(vec![sample()]);
        }
        let drained = spool.drain_all();
        assert!(drained.len() <= 2);
        std::fs::remove_dir_all(&root).ok();
    }
}
