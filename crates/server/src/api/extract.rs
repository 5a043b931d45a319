//! A `Json` extractor that maps every rejection — bad syntax *and* bad
//! data (wrong variant, missing field, wrong type) — to `400 BAD_REQUEST`.
//!
//! The stock `axum::Json` extractor returns `422 UNPROCESSABLE_ENTITY` for
//! data errors (e.g. `level: "WARN"` against the canonical-level enum),
//! but §4.G/§8 both require a flat `400` for any malformed envelope,
//! syntax or data. Wrapping it here keeps every ingest/device-auth handler
//! from having to special-case its own rejection handling.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use logsentry_protocol::ErrorBody;
use serde::de::DeserializeOwned;

pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(bad_request(rejection)),
        }
    }
}

fn bad_request(rejection: JsonRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody::new(rejection.body_text())),
    )
        .into_response()
}
