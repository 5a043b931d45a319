//! `GET /summary/:app_id` (§4.K): per-service health plus a recent-error tail.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use logsentry_protocol::{ErrorBody, SummaryResponse};
use uuid::Uuid;

use crate::api::auth::AuthenticatedApp;
use crate::state::AppState;

/// Authorization here is api-key-to-app ownership, nothing more: resolve
/// the caller's key through the same registry `/ingest` uses and require
/// it to name the same `app_id` as the path. There is no separate
/// user-session layer in scope.
pub async fn summary(
    State(state): State<AppState>,
    Extension(AuthenticatedApp(caller_app_id)): Extension<AuthenticatedApp>,
    Path(app_id): Path<Uuid>,
) -> Response {
    if caller_app_id != app_id {
        return (
            StatusCode::FORBIDDEN,
            Json(ErrorBody::new("api key does not belong to this app")),
        )
            .into_response();
    }

    let services = state
        .aggregates
        .services_for_app(app_id)
        .into_iter()
        .map(|snap| (*snap).clone())
        .collect();
    let recent_errors = state.recent_errors.recent_for_app(app_id);

    Json(SummaryResponse {
        app_id,
        services,
        recent_errors,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::aggregate::{AggregateIndex, AggregateState, RecentErrorsIndex};
    use crate::runtime::classifier::Classifier;
    use crate::runtime::processor::ProcessorRegistry;
    use crate::runtime::store::FileLogStore;
    use axum::body::to_bytes;
    use logsentry_auth::{ApiKeyRegistry, DeviceSessionStore};
    use logsentry_core::config::Config;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_state(data_path: std::path::PathBuf) -> AppState {
        let config = Arc::new(Config {
            server: logsentry_core::config::ServerConfig {
                data_path: data_path.clone(),
                ..Default::default()
            },
            ..Default::default()
        });
        let aggregates = Arc::new(AggregateIndex::new());
        let recent_errors = Arc::new(RecentErrorsIndex::new());
        let classifier = Arc::new(Classifier::new(None, 1, Duration::from_millis(100)));
        let store = Arc::new(FileLogStore::new(data_path.join("logs")));
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

    fn temp_dir() -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("logsentry-summary-test-{}", Uuid::new_v4()));
        dir
    }

    #[tokio::test]
    async fn mismatched_caller_gets_forbidden() {
        let dir = temp_dir();
        let state = test_state(dir.clone());
        let app_id = Uuid::new_v4();
        let other_app_id = Uuid::new_v4();

        let resp = summary(
            State(state),
            Extension(AuthenticatedApp(other_app_id)),
            Path(app_id),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn matching_caller_returns_published_snapshot() {
        let dir = temp_dir();
        let state = test_state(dir.clone());
        let app_id = Uuid::new_v4();

        let snapshot = AggregateState::new("billing".into(), 360).snapshot(app_id);
        state.aggregates.publish(snapshot);
        state.recent_errors.push(
            app_id,
            RecentErrorRecord {
                timestamp: chrono::Utc::now(),
                service: "billing".into(),
                message: "boom".into(),
                fingerprint: "fp".into(),
            },
        );

        let resp = summary(
            State(state),
            Extension(AuthenticatedApp(app_id)),
            Path(app_id),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let parsed: SummaryResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.app_id, app_id);
        assert_eq!(parsed.services.len(), 1);
        assert_eq!(parsed.services[0].service, "billing");
        assert_eq!(parsed.recent_errors.len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
