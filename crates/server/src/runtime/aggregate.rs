//! Rolling per-`(app_id, service)` health aggregate (§4.J).
//!
//! Mutated only by the owning per-app task; readers go through
//! [`AggregateIndex`], which holds published immutable snapshot pointers so
//! a reader never observes a torn read.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use logsentry_core::model::{AggregateSnapshot, Health, Level, PerLevelCount};
use logsentry_protocol::RecentErrorRecord;
use parking_lot::RwLock;
use uuid::Uuid;

/// Bound on recent-error records retained per app for `/summary` (§4.K).
const RECENT_ERRORS_PER_APP: usize = 50;

/// Mutable working state the owning per-app task updates record-by-record.
/// `AggregateSnapshot` (immutable) is derived from this and published
/// periodically via [`AggregateIndex::publish`].
pub struct AggregateState {
    service: String,
    total_count: u64,
    per_level_count: PerLevelCount,
    window_count: usize,
    /// FIFO-aged error counts, one entry per 10 most-recent records (§4.J).
    errors_per_10_logs: VecDeque<u32>,
    current_window_size: u32,
    current_window_errors: u32,
    first_error_ts: Option<DateTime<Utc>>,
    latest_error_ts: Option<DateTime<Utc>>,
    error_fingerprint_counts: HashMap<String, u64>,
    recent_error_fingerprints: VecDeque<(DateTime<Utc>, String)>,
}

impl AggregateState {
    pub fn new(service: String, window_count: usize) -> Self {
        Self {
            service,
            total_count: 0,
            per_level_count: PerLevelCount::default(),
            window_count,
            errors_per_10_logs: VecDeque::new(),
            current_window_size: 0,
            current_window_errors: 0,
            first_error_ts: None,
            latest_error_ts: None,
            error_fingerprint_counts: HashMap::new(),
            recent_error_fingerprints: VecDeque::new(),
        }
    }

    /// Fold one record into the aggregate (§4.J).
    pub fn record(&mut self, level: Level, fingerprint: &str, ingested_at: DateTime<Utc>) {
        self.total_count += 1;
        self.per_level_count.increment(level);

        if level.is_error() {
            self.current_window_errors += 1;
            if self.first_error_ts.is_none() {
                self.first_error_ts = Some(ingested_at);
            }
            self.latest_error_ts = Some(ingested_at);

            *self
                .error_fingerprint_counts
                .entry(fingerprint.to_string())
                .or_insert(0) += 1;
            self.recent_error_fingerprints
                .push_back((ingested_at, fingerprint.to_string()));
        }

        self.current_window_size += 1;
        if self.current_window_size == 10 {
            self.errors_per_10_logs.push_back(self.current_window_errors);
            while self.errors_per_10_logs.len() > self.window_count {
                self.errors_per_10_logs.pop_front();
            }
            self.current_window_size = 0;
            self.current_window_errors = 0;
        }

        let cutoff = ingested_at - Duration::minutes(10);
        while self
            .recent_error_fingerprints
            .front()
            .map(|(ts, _)| *ts < cutoff)
            .unwrap_or(false)
        {
            self.recent_error_fingerprints.pop_front();
        }
    }

    fn most_common_error(&self) -> (Option<String>, u64) {
        self.error_fingerprint_counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(fp, count)| (Some(fp.clone()), *count))
            .unwrap_or((None, 0))
    }

    fn recent_count_for(&self, fingerprint: &str) -> u64 {
        self.recent_error_fingerprints
            .iter()
            .filter(|(_, fp)| fp == fingerprint)
            .count() as u64
    }

    /// Build an immutable snapshot for publication (§4.J health classification).
    pub fn snapshot(&self, app_id: Uuid) -> AggregateSnapshot {
        let avg = if self.errors_per_10_logs.is_empty() {
            0.0
        } else {
            self.errors_per_10_logs.iter().sum::<u32>() as f64 / self.errors_per_10_logs.len() as f64
        };

        let (most_common_error_fingerprint, most_common_error_count) = self.most_common_error();
        let recent_most_common = most_common_error_fingerprint
            .as_deref()
            .map(|fp| self.recent_count_for(fp))
            .unwrap_or(0);

        let health = if avg >= 5.0 || recent_most_common >= 20 {
            Health::Unhealthy
        } else if avg >= 2.0 {
            Health::Warning
        } else {
            Health::Healthy
        };

        AggregateSnapshot {
            app_id,
            service: self.service.clone(),
            total_count: self.total_count,
            per_level_count: self.per_level_count,
            errors_per_10_logs: self.errors_per_10_logs.iter().copied().collect(),
            avg_errors_per_10_logs: avg,
            first_error_ts: self.first_error_ts,
            latest_error_ts: self.latest_error_ts,
            most_common_error_fingerprint,
            most_common_error_count,
            health,
            updated_at: Utc::now(),
        }
    }
}

/// Shared, read-mostly index of the latest published snapshot per
/// `(app_id, service)`. Updated only by `publish`; readers clone the `Arc`
/// pointer, never the contents (§4.J: "read-copy operation").
#[derive(Default)]
pub struct AggregateIndex {
    snapshots: RwLock<HashMap<(Uuid, String), Arc<AggregateSnapshot>>>,
}

impl AggregateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: AggregateSnapshot) {
        let key = (snapshot.app_id, snapshot.service.clone());
        self.snapshots.write().insert(key, Arc::new(snapshot));
    }

    pub fn services_for_app(&self, app_id: Uuid) -> Vec<Arc<AggregateSnapshot>> {
        self.snapshots
            .read()
            .iter()
            .filter(|((id, _), _)| *id == app_id)
            .map(|(_, snap)| snap.clone())
            .collect()
    }
}

/// Bounded per-app tail of recent error records, for the `/summary`
/// endpoint's `recent_errors` field (§4.K). Kept separate from
/// `AggregateIndex` since it retains individual records rather than
/// rolled-up counts.
#[derive(Default)]
pub struct RecentErrorsIndex {
    by_app: RwLock<HashMap<Uuid, VecDeque<RecentErrorRecord>>>,
}

impl RecentErrorsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, app_id: Uuid, record: RecentErrorRecord) {
        let mut by_app = self.by_app.write();
        let entries = by_app.entry(app_id).or_default();
        entries.push_back(record);
        while entries.len() > RECENT_ERRORS_PER_APP {
            entries.pop_front();
        }
    }

    pub fn recent_for_app(&self, app_id: Uuid) -> Vec<RecentErrorRecord> {
        self.by_app
            .read()
            .get(&app_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    use chrono::TimeZone;

    #[test]
    fn healthy_with_no_errors() {
        let mut state = AggregateState::new("svc".into(), 360);
        for _ in 0..10 {
            state.record(Level::Info, "fp", fixed_time());
        }
        let snap = state.snapshot(Uuid::nil());
        assert_eq!(snap.health, Health::Healthy);
        assert_eq!(snap.errors_per_10_logs, vec![0]);
    }

    #[test]
    fn unhealthy_when_avg_errors_high() {
        let mut state = AggregateState::new("svc".into(), 360);
        for _ in 0..10 {
            state.record(Level::Error, "fp-a", fixed_time());
        }
        let snap = state.snapshot(Uuid::nil());
        assert_eq!(snap.avg_errors_per_10_logs, 10.0);
        assert_eq!(snap.health, Health::Unhealthy);
    }

    #[test]
    fn warning_band_between_two_and_five() {
        let mut state = AggregateState::new("svc".into(), 360);
        for i in 0..10 {
            let level = if i < 3 { Level::Error } else { Level::Info };
            state.record(level, "fp", fixed_time());
        }
        let snap = state.snapshot(Uuid::nil());
        assert_eq!(snap.health, Health::Warning);
    }

    #[test]
    fn window_series_capped_at_configured_length() {
        let mut state = AggregateState::new("svc".into(), 3);
        for _ in 0..50 {
            state.record(Level::Info, "fp", fixed_time());
        }
        let snap = state.snapshot(Uuid::nil());
        assert!(snap.errors_per_10_logs.len() <= 3);
    }

    #[test]
    fn most_common_error_fingerprint_tracked() {
        let mut state = AggregateState::new("svc".into(), 360);
        state.record(Level::Error, "fp-a", fixed_time());
        state.record(Level::Error, "fp-a", fixed_time());
        state.record(Level::Error, "fp-b", fixed_time());
        let snap = state.snapshot(Uuid::nil());
        assert_eq!(snap.most_common_error_fingerprint, Some("fp-a".into()));
        assert_eq!(snap.most_common_error_count, 2);
    }

    #[test]
    fn aggregate_index_publish_then_read() {
        let index = AggregateIndex::new();
        let app_id = Uuid::new_v4();
        let mut state = AggregateState::new("svc".into(), 360);
        state.record(Level::Info, "fp", fixed_time());
        index.publish(state.snapshot(app_id));
        let services = index.services_for_app(app_id);
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].service, "svc");
    }

    #[test]
    fn recent_errors_index_caps_at_fifty_per_app() {
        let index = RecentErrorsIndex::new();
        let app_id = Uuid::new_v4();
        for i in 0..60 {
            index.push(
                app_id,
                RecentErrorRecord {
                    timestamp: fixed_time(),
                    service: "svc".into(),
                    message: format!("error {i}"),
                    fingerprint: "fp".into(),
                },
            );
        }
        let recent = index.recent_for_app(app_id);
        assert_eq!(recent.len(), 50);
        assert_eq!(recent.last().unwrap().message, "error 59");
    }
}
