//! Core data model shared by the ingestion server and the SDK: log records,
//! apps, API keys, device sessions, and the rolling health aggregate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum serialized size of a single log record (§3).
pub const MAX_RECORD_BYTES: usize = 32 * 1024;
/// Maximum UTF-8 length of `message` before truncation.
pub const MAX_MESSAGE_CHARS: usize = 16 * 1024;
/// Maximum number of entries in `attributes`.
pub const MAX_ATTRIBUTES: usize = 32;
/// Maximum serialized size of `attributes`.
pub const MAX_ATTRIBUTES_BYTES: usize = 4 * 1024;

/// Canonical severity level. Deliberately closed — `"WARN"` and other
/// aliases are not accepted (§8, boundary behaviors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    pub fn is_error(self) -> bool {
        matches!(self, Level::Error | Level::Critical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

/// A scalar attribute value. Nested containers are rejected at the SDK
/// boundary rather than the server (§9, Dynamic typing of attributes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

pub type Attributes = HashMap<String, AttributeValue>;

/// A single structured log record, as produced by the SDK and consumed by
/// the server. `fingerprint` and `ingested_at` are absent on the wire and
/// stamped in server-side during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl LogRecord {
    /// Truncate `message` to `MAX_MESSAGE_CHARS`. Never touches any other field.
    pub fn truncate_message(&mut self) {
        if self.message.chars().count() > MAX_MESSAGE_CHARS {
            self.message = self.message.chars().take(MAX_MESSAGE_CHARS).collect();
        }
    }

    /// Resolve the effective service name, defaulting to the owning app's
    /// name when the record carries none (§9: missing → app name).
    pub fn effective_service<'a>(&'a self, app_name: &'a str) -> &'a str {
        self.service.as_deref().unwrap_or(app_name)
    }
}

/// An owner-scoped tenant. All logs and API keys are grouped under an app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A bearer secret authenticating a single app for ingest. Only the hash is
/// ever persisted; `plaintext_once` exists only transiently at mint time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub app_id: Uuid,
    /// Argon2id PHC-format hash of the plaintext key. Authoritative for
    /// validation; see `logsentry_core::keyhash`.
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// Status of an in-progress device-authorization handshake (§3). Transitions
/// are monotone: pending → approved → completed, or any state → expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSessionStatus {
    Pending,
    Approved,
    Completed,
    Expired,
    Denied,
}

impl DeviceSessionStatus {
    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(self, next: DeviceSessionStatus) -> bool {
        use DeviceSessionStatus::*;
        match next {
            Expired | Denied => !matches!(self, Completed),
            Approved => matches!(self, Pending),
            Completed => matches!(self, Pending | Approved),
            Pending => false,
        }
    }
}

/// Ephemeral coordination record binding a CLI session to an approving
/// browser session and, on completion, a minted API key (§3, §4.I).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSession {
    pub device_code: String,
    pub user_code: String,
    pub status: DeviceSessionStatus,
    pub app_name: String,
    pub description: Option<String>,
    pub user_id: Option<String>,
    pub app_id: Option<Uuid>,
    /// Set on completion; cleared immediately after its single successful
    /// `poll` read (invariant 3, §8).
    pub api_key_plaintext: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl DeviceSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An append-only persisted record (§3, §6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedLog {
    pub id: Uuid,
    pub app_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub level: Level,
    pub service: String,
    pub message: String,
    pub attributes: Attributes,
    pub fingerprint: String,
    pub classification: Option<String>,
}

/// Per-level counts, always in `Level::ALL` order.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerLevelCount {
    pub trace: u64,
    pub debug: u64,
    pub info: u64,
    pub warning: u64,
    pub error: u64,
    pub critical: u64,
}

impl PerLevelCount {
    pub fn increment(&mut self, level: Level) {
        match level {
            Level::Trace => self.trace += 1,
            Level::Debug => self.debug += 1,
            Level::Info => self.info += 1,
            Level::Warning => self.warning += 1,
            Level::Error => self.error += 1,
            Level::Critical => self.critical += 1,
        }
    }

    pub fn get(&self, level: Level) -> u64 {
        match level {
            Level::Trace => self.trace,
            Level::Debug => self.debug,
            Level::Info => self.info,
            Level::Warning => self.warning,
            Level::Error => self.error,
            Level::Critical => self.critical,
        }
    }

    pub fn as_map(&self) -> HashMap<&'static str, u64> {
        Level::ALL.iter().map(|l| (l.as_str(), self.get(*l))).collect()
    }
}

/// Per-service health classification (§4.J).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Warning,
    Unhealthy,
}

/// Immutable, publishable snapshot of a `(app_id, service)` rolling
/// aggregate (§4.J). The owning per-app task replaces this pointer; readers
/// never see a torn read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub app_id: Uuid,
    pub service: String,
    pub total_count: u64,
    pub per_level_count: PerLevelCount,
    /// FIFO-aged series of error counts per 10-record window, length <= 360.
    pub errors_per_10_logs: Vec<u32>,
    pub avg_errors_per_10_logs: f64,
    pub first_error_ts: Option<DateTime<Utc>>,
    pub latest_error_ts: Option<DateTime<Utc>>,
    pub most_common_error_fingerprint: Option<String>,
    pub most_common_error_count: u64,
    pub health: Health,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_session_status_transitions_are_monotone() {
        use DeviceSessionStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Completed));
        assert!(Approved.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Approved));
        assert!(!Completed.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Expired));
        assert!(!Completed.can_transition_to(Expired));
    }

    #[test]
    fn effective_service_defaults_to_app_name() {
        let record = LogRecord {
            timestamp: Utc::now(),
            level: Level::Info,
            message: "hi".into(),
            service: None,
            attributes: Attributes::default(),
        };
        assert_eq!(record.effective_service("svc-a"), "svc-a");
    }

    #[test]
    fn per_level_count_round_trips() {
        let mut counts = PerLevelCount::default();
        counts.increment(Level::Error);
        counts.increment(Level::Error);
        counts.increment(Level::Info);
        assert_eq!(counts.get(Level::Error), 2);
        assert_eq!(counts.as_map()["ERROR"], 2);
        assert_eq!(counts.as_map()["INFO"], 1);
    }
}
