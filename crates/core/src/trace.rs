//! Structured domain events, emitted via `tracing` at key lifecycle points.
//!
//! These are not a separate logging channel — each variant is turned into a
//! single `tracing::info!`/`warn!` call with its fields flattened, so the
//! event is filterable and indexable the same way as any other span field.
//! The enum exists to keep the set of emitted events and their fields
//! centralized and typed, rather than scattered ad-hoc across call sites.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    BatchIngested {
        app_id: Uuid,
        accepted: usize,
    },
    KeyRejected {
        reason: &'static str,
    },
    BackpressureApplied {
        app_id: Uuid,
        retry_after_secs: u64,
    },
    DeviceSessionStarted {
        user_code: String,
    },
    DeviceSessionCompleted {
        app_id: Uuid,
    },
    DeviceSessionExpired {
        user_code: String,
    },
    ProcessorDegraded {
        app_id: Uuid,
        consecutive_failures: u32,
    },
    ProcessorRecovered {
        app_id: Uuid,
    },
    AggregateSnapshotPublished {
        app_id: Uuid,
        service: String,
    },
    ClassifierFallback {
        app_id: Uuid,
        reason: &'static str,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "logsentry_event");
    }
}
