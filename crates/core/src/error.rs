/// Shared error type used across all logsentry crates.
///
/// Variant names track the error taxonomy: one variant per named error
/// kind, plus a handful of lower-level carriers for I/O and serialization
/// failures that bubble up from underlying libraries.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing credentials")]
    MissingCredentials,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("backpressure")]
    Backpressure,

    #[error("classifier failed: {0}")]
    ClassifierFailed(String),

    #[error("store write failed: {0}")]
    StoreWriteFailed(String),

    #[error("session expired")]
    SessionExpired,

    #[error("session consumed")]
    SessionConsumed,

    #[error("rate limited")]
    RateLimited,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
