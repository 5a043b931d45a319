//! Device-authorization handshake endpoints (§4.I).

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use logsentry_auth::DevicePollOutcome;
use logsentry_core::trace::TraceEvent;
use logsentry_core::Error;
use logsentry_protocol::{
    DeviceCompleteRequest, DeviceCompleteResponse, DevicePollResponse, DeviceStartRequest,
    DeviceStartResponse, ErrorBody,
};

use crate::api::extract::ApiJson;
use crate::state::AppState;

pub async fn start(State(state): State<AppState>, ApiJson(req): ApiJson<DeviceStartRequest>) -> Json<DeviceStartResponse> {
    let session = state.device_sessions.start(req.app_name, req.description);
    TraceEvent::DeviceSessionStarted {
        user_code: session.user_code.clone(),
    }
    .emit();
    Json(DeviceStartResponse {
        device_code: session.device_code,
        user_code: session.user_code,
        verification_url: state.config.device_auth.verification_url.clone(),
        poll_interval_seconds: state.config.device_auth.poll_interval_secs,
    })
}

pub async fn complete(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<DeviceCompleteRequest>,
) -> Response {
    match state
        .device_sessions
        .complete(&state.api_keys, &req.user_code, &req.user_id)
    {
        Ok(app_id) => {
            TraceEvent::DeviceSessionCompleted { app_id }.emit();
            Json(DeviceCompleteResponse { app_id }).into_response()
        }
        Err(Error::SessionExpired) => {
            TraceEvent::DeviceSessionExpired {
                user_code: req.user_code.clone(),
            }
            .emit();
            (StatusCode::GONE, Json(ErrorBody::new("session expired"))).into_response()
        }
        Err(e) => (StatusCode::NOT_FOUND, Json(ErrorBody::new(e.to_string()))).into_response(),
    }
}

#[derive(serde::Deserialize)]
pub struct PollQuery {
    device_code: String,
}

pub async fn poll(State(state): State<AppState>, Query(query): Query<PollQuery>) -> Response {
    match state.device_sessions.poll(&query.device_code) {
        Ok(DevicePollOutcome::Pending) => {
            (StatusCode::ACCEPTED, Json(DevicePollResponse::Pending)).into_response()
        }
        Ok(DevicePollOutcome::Expired) => {
            (StatusCode::GONE, Json(DevicePollResponse::Expired)).into_response()
        }
        Ok(DevicePollOutcome::Consumed) => {
            (StatusCode::GONE, Json(DevicePollResponse::Consumed)).into_response()
        }
        Ok(DevicePollOutcome::Ok { api_key, app_id }) => (
            StatusCode::OK,
            Json(DevicePollResponse::Ok {
                api_key,
                app_id,
                dsn: state.config.server.public_dsn.clone(),
            }),
        )
            .into_response(),
        Err(Error::RateLimited) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::new("poll rate limit exceeded")),
        )
            .into_response(),
        Err(e) => (StatusCode::NOT_FOUND, Json(ErrorBody::new(e.to_string()))).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::aggregate::{AggregateIndex, RecentErrorsIndex};
    use crate::runtime::classifier::Classifier;
    use crate::runtime::processor::ProcessorRegistry;
    use crate::runtime::store::FileLogStore;
    use logsentry_auth::{ApiKeyRegistry, DeviceSessionStore};
    use logsentry_core::config::Config;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn test_state() -> AppState {
        let mut dir = std::env::temp_dir();
        dir.push(format!("logsentry-device-auth-test-{}", Uuid::new_v4()));
        let config = Arc::new(Config {
            server: logsentry_core::config::ServerConfig {
                data_path: dir.clone(),
                ..Default::default()
            },
            ..Default::default()
        });
        let aggregates = Arc::new(AggregateIndex::new());
        let recent_errors = Arc::new(RecentErrorsIndex::new());
        let classifier = Arc::new(Classifier::new(None, 1, Duration::from_millis(100)));
        let store = Arc::new(FileLogStore::new(dir.join("logs")));
        let processors = Arc::new(ProcessorRegistry::new(
            aggregates.clone(),
            recent_errors.clone(),
            store.clone(),
            classifier.clone(),
            config.clone(),
        ));
        AppState {
            config,
            api_keys: Arc::new(ApiKeyRegistry::new(b"test-pepper".to_vec())),
            device_sessions: Arc::new(DeviceSessionStore::new(
                chrono::Duration::seconds(600),
                Duration::from_secs(1),
            )),
            processors,
            aggregates,
            recent_errors,
            classifier,
            store,
        }
    }

    #[tokio::test]
    async fn full_handshake_start_complete_poll() {
        let state = test_state();

        let started = start(
            State(state.clone()),
            ApiJson(DeviceStartRequest {
                app_name: "billing".into(),
                description: None,
            }),
        )
        .await;
        assert!(!started.device_code.is_empty());
        assert!(!started.user_code.is_empty());

        let completed = complete(
            State(state.clone()),
            ApiJson(DeviceCompleteRequest {
                user_code: started.user_code.clone(),
                user_id: "user-1".into(),
            }),
        )
        .await;
        assert_eq!(completed.status(), StatusCode::OK);

        let polled = poll(
            State(state),
            Query(PollQuery {
                device_code: started.device_code,
            }),
        )
        .await;
        assert_eq!(polled.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn complete_with_unknown_user_code_is_not_found() {
        let state = test_state();
        let resp = complete(
            State(state),
            ApiJson(DeviceCompleteRequest {
                user_code: "bogus".into(),
                user_id: "user-1".into(),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn poll_before_completion_is_pending() {
        let state = test_state();
        let started = start(
            State(state.clone()),
            ApiJson(DeviceStartRequest {
                app_name: "billing".into(),
                description: None,
            }),
        )
        .await;

        let resp = poll(
            State(state),
            Query(PollQuery {
                device_code: started.device_code,
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn poll_unknown_device_code_is_not_found() {
        let state = test_state();
        let resp = poll(
            State(state),
            Query(PollQuery {
                device_code: "unknown".into(),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
