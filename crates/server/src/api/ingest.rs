//! `POST /ingest` (§4.G): validate, authenticate, fingerprint, and enqueue.

use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use logsentry_core::fingerprint::fingerprint;
use logsentry_core::model::{PersistedLog, MAX_ATTRIBUTES, MAX_ATTRIBUTES_BYTES};
use logsentry_core::trace::TraceEvent;
use logsentry_core::Error;
use logsentry_protocol::{ErrorBody, IngestRequest, IngestResponse};
use uuid::Uuid;

use crate::api::extract::ApiJson;
use crate::state::AppState;

/// Processing order follows §4.G exactly: parse, authenticate, bound the
/// record count, stamp/fingerprint each record, then hand the batch to the
/// per-app processor. The envelope byte cap is enforced a layer up via
/// `DefaultBodyLimit`. A malformed envelope — bad syntax or a bad value
/// such as a non-canonical `level` — is rejected as `400` by `ApiJson`
/// rather than the stock extractor's `422`.
pub async fn ingest(State(state): State<AppState>, ApiJson(req): ApiJson<IngestRequest>) -> Response {
    if req.logs.len() > state.config.ingest.max_records_per_envelope {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(ErrorBody::new("envelope exceeds max records per request")),
        )
            .into_response();
    }

    let app_id = match state.api_keys.lookup(&req.api_key) {
        Ok(app_id) => app_id,
        Err(_) => {
            TraceEvent::KeyRejected {
                reason: "lookup failed",
            }
            .emit();
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody::new("invalid or revoked api key")),
            )
                .into_response();
        }
    };

    let Some(app) = state.api_keys.get_app(app_id) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("invalid or revoked api key")),
        )
            .into_response();
    };

    let now = Utc::now();
    let mut persisted = Vec::with_capacity(req.logs.len());
    for wire in req.logs {
        if wire.attributes.len() > MAX_ATTRIBUTES {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("too many attributes on a record")),
            )
                .into_response();
        }
        if attributes_byte_len(&wire.attributes) > MAX_ATTRIBUTES_BYTES {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("attributes exceed the size limit")),
            )
                .into_response();
        }

        let mut record: logsentry_core::model::LogRecord = wire.into();
        record.truncate_message();
        let service = record.effective_service(&app.name).to_string();
        let fp = fingerprint(app_id, record.level, &record.message, &service);

        persisted.push(PersistedLog {
            id: Uuid::new_v4(),
            app_id,
            timestamp: record.timestamp,
            ingested_at: now,
            level: record.level,
            service,
            message: record.message,
            attributes: record.attributes,
            fingerprint: fp,
            classification: None,
        });
    }

    let accepted = persisted.len();
    let wait = Duration::from_millis(state.config.ingest.enqueue_wait_ms);
    match state.processors.enqueue(app_id, persisted, wait).await {
        Ok(()) => {
            TraceEvent::BatchIngested { app_id, accepted }.emit();
            (StatusCode::OK, Json(IngestResponse { accepted })).into_response()
        }
        Err(Error::Backpressure) => {
            TraceEvent::BackpressureApplied {
                app_id,
                retry_after_secs: 1,
            }
            .emit();
            let mut resp = (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody::new("server is applying backpressure, retry shortly")),
            )
                .into_response();
            resp.headers_mut()
                .insert("retry-after", HeaderValue::from_static("1"));
            resp
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new(e.to_string())),
        )
            .into_response(),
    }
}

fn attributes_byte_len(attributes: &logsentry_core::model::Attributes) -> usize {
    serde_json::to_vec(attributes).map(|v| v.len()).unwrap_or(0)
}
