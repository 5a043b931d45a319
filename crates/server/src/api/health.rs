//! Public liveness probe (§4.K).

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

#[derive(serde::Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health(State(_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
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

    #[tokio::test]
    async fn health_reports_ok() {
        let config = Arc::new(Config::default());
        let aggregates = Arc::new(AggregateIndex::new());
        let recent_errors = Arc::new(RecentErrorsIndex::new());
        let classifier = Arc::new(Classifier::new(None, 1, Duration::from_millis(100)));
        let store = Arc::new(FileLogStore::new(config.server.data_path.join("logs")));
        let processors = Arc::new(ProcessorRegistry::new(
            aggregates.clone(),
            recent_errors.clone(),
            store.clone(),
            classifier.clone(),
            config.clone(),
        ));
        let state = AppState {
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
        };

        let Json(body) = health(State(state)).await;
        assert_eq!(body.status, "ok");
    }
}
