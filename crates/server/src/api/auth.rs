//! Bearer-header API-key middleware for `/summary/:app_id` (§4.K).
//!
//! `/ingest` carries its api key in the JSON body instead (§6.1) and
//! resolves it directly in its own handler, so this middleware is not on
//! that path. Here, each request's `Authorization: Bearer <key>` resolves
//! to a distinct `app_id` via [`logsentry_auth::ApiKeyRegistry::lookup`],
//! which is the only place the authoritative (Argon2id) check happens. The
//! resolved `app_id` is attached to the request as an extension so the
//! handler can confirm it matches the path's `app_id`.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::state::AppState;

pub async fn require_api_key(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if provided.is_empty() {
        return unauthorized();
    }

    match state.api_keys.lookup(provided) {
        Ok(app_id) => {
            req.extensions_mut().insert(AuthenticatedApp(app_id));
            next.run(req).await
        }
        Err(_) => unauthorized(),
    }
}

/// The `app_id` an authenticated request's API key resolved to.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedApp(pub Uuid);

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({ "error": "invalid or missing API key" })),
    )
        .into_response()
}
