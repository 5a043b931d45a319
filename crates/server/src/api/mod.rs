pub mod auth;
pub mod device_auth;
pub mod extract;
pub mod health;
pub mod ingest;
pub mod summary;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// `/ingest` authenticates itself: the api key travels inside the JSON
/// envelope (§6.1), not a header, so the handler resolves it directly via
/// `ApiKeyRegistry::lookup` rather than through middleware. `/summary/:app_id`
/// is the one route that still fits a bearer-header middleware, since the
/// handler only needs to confirm the resolved `app_id` matches the path.
/// Health and the device-authorization handshake are unauthenticated.
pub fn router(state: AppState) -> Router<AppState> {
    let max_envelope_bytes = state.config.ingest.max_envelope_bytes;

    let ingest_route = Router::new()
        .route("/ingest", post(ingest::ingest))
        .layer(axum::extract::DefaultBodyLimit::max(max_envelope_bytes));

    let summary_route = Router::new()
        .route("/summary/:app_id", get(summary::summary))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_key,
        ));

    Router::new()
        .route("/v1/health", get(health::health))
        .route("/sdk/device/start", post(device_auth::start))
        .route("/sdk/device/complete", post(device_auth::complete))
        .route("/sdk/device/poll", get(device_auth::poll))
        .merge(ingest_route)
        .merge(summary_route)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
