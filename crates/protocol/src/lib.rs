//! Wire types for the ingestion endpoint, the device-authorization
//! handshake, and the summary reader (§6).
//!
//! These are the types that cross a process boundary. Anything that lives
//! only inside the server or only inside the SDK belongs in `logsentry-core`
//! or the respective crate instead.

use chrono::{DateTime, TimeZone, Utc};
use logsentry_core::model::{AggregateSnapshot, AttributeValue, Level, LogRecord};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// §6.1 Ingest envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `timestamp` on the wire may be an ISO-8601 string or an epoch-seconds
/// number (§6.1). Wrapping the field lets `WireLogRecord` derive
/// `Deserialize` normally instead of hand-rolling a visitor.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(transparent)]
pub struct WireTimestamp(pub DateTime<Utc>);

impl<'de> Deserialize<'de> for WireTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Epoch(f64),
            Iso(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Epoch(secs) => {
                let whole = secs.trunc() as i64;
                let nanos = (secs.fract() * 1_000_000_000.0).round() as u32;
                Utc.timestamp_opt(whole, nanos)
                    .single()
                    .map(WireTimestamp)
                    .ok_or_else(|| serde::de::Error::custom("timestamp out of range"))
            }
            Raw::Iso(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| WireTimestamp(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}

/// A log record exactly as received on the wire, before the server stamps
/// `ingested_at`, derives `fingerprint`, and binds `app_id` (§4.G step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireLogRecord {
    pub timestamp: WireTimestamp,
    pub level: Level,
    pub message: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
}

impl From<LogRecord> for WireLogRecord {
    fn from(record: LogRecord) -> Self {
        WireLogRecord {
            timestamp: WireTimestamp(record.timestamp),
            level: record.level,
            message: record.message,
            service: record.service,
            attributes: record.attributes,
        }
    }
}

impl From<WireLogRecord> for LogRecord {
    fn from(wire: WireLogRecord) -> Self {
        LogRecord {
            timestamp: wire.timestamp.0,
            level: wire.level,
            message: wire.message,
            service: wire.service,
            attributes: wire.attributes,
        }
    }
}

/// `POST /ingest` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub api_key: String,
    pub logs: Vec<WireLogRecord>,
}

/// `POST /ingest` success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub accepted: usize,
}

/// Uniform error body for non-2xx ingest/device-auth responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// §4.I / §6.2 Device authorization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStartRequest {
    pub app_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStartResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCompleteRequest {
    pub user_code: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCompleteResponse {
    pub app_id: Uuid,
}

/// `GET /sdk/device/poll` response. Tagged on `status` so the SDK/CLI can
/// match without guessing which optional fields are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DevicePollResponse {
    Pending,
    Expired,
    Consumed,
    Ok {
        api_key: String,
        app_id: Uuid,
        dsn: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// §4.K Summary reader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub message: String,
    pub fingerprint: String,
}

/// Full response body for `GET /summary/{app_id}`: one `AggregateSnapshot`
/// per known service, plus a bounded tail of recent error records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub app_id: Uuid,
    pub services: Vec<AggregateSnapshot>,
    /// Up to 50 recent-error records across all services (§4.K).
    pub recent_errors: Vec<RecentErrorRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_timestamp_parses_epoch_number() {
        let parsed: WireTimestamp = serde_json::from_str("1700000000").unwrap();
        assert_eq!(parsed.0.timestamp(), 1_700_000_000);
    }

    #[test]
    fn wire_timestamp_parses_iso8601() {
        let parsed: WireTimestamp = serde_json::from_str("\"2024-01-01T00:00:00Z\"").unwrap();
        assert_eq!(parsed.0.timestamp(), 1_704_067_200);
    }

    #[test]
    fn wire_log_record_rejects_level_alias() {
        let body = r#"{"timestamp": 1700000000, "level": "WARN", "message": "x"}"#;
        let result: Result<WireLogRecord, _> = serde_json::from_str(body);
        assert!(result.is_err(), "WARN is not a canonical level");
    }

    #[test]
    fn wire_log_record_accepts_canonical_level() {
        let body = r#"{"timestamp": 1700000000, "level": "WARNING", "message": "x"}"#;
        let result: Result<WireLogRecord, _> = serde_json::from_str(body);
        assert!(result.is_ok());
    }

    #[test]
    fn device_poll_response_tags_on_status() {
        let ok = DevicePollResponse::Ok {
            api_key: "sk_abc".into(),
            app_id: Uuid::nil(),
            dsn: "http://localhost:3210".into(),
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["api_key"], "sk_abc");
    }

    #[test]
    fn wire_log_record_converts_into_log_record() {
        let wire = WireLogRecord {
            timestamp: WireTimestamp(Utc::now()),
            level: Level::Error,
            message: "boom".into(),
            service: Some("billing".into()),
            attributes: HashMap::new(),
        };
        let record: LogRecord = wire.into();
        assert_eq!(record.message, "boom");
        assert_eq!(record.service.as_deref(), Some("billing"));
    }

    #[test]
    fn empty_logs_envelope_parses() {
        let body = r#"{"api_key":"sk_x","logs":[]}"#;
        let req: IngestRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.logs.len(), 0);
    }
}
