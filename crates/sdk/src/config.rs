//! `init()` argument resolution (§4.F, §6.4).

use crate::credentials::read_credentials;
use crate::types::SdkError;

const DEFAULT_DSN: &str = "http://localhost:3210";
const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_FLUSH_INTERVAL_SECONDS: f64 = 5.0;

/// Arguments accepted by `init()`, all optional (§4.D-E).
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub api_key: Option<String>,
    pub dsn: Option<String>,
    pub batch_size: Option<usize>,
    pub flush_interval_seconds: Option<f64>,
    pub max_buffer: Option<usize>,
}

/// Fully-resolved configuration ready to hand to the flusher and buffer.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_key: String,
    pub dsn: String,
    pub batch_size: usize,
    pub flush_interval_seconds: f64,
    pub max_buffer: usize,
}

/// Resolve `init()` arguments against the environment and local credentials
/// file, applying the precedence and clamps in §4.E-F.
pub fn resolve(options: InitOptions) -> Result<ResolvedConfig, SdkError> {
    let credentials = options
        .api_key
        .is_none()
        .then(read_credentials)
        .flatten();

    let api_key = options
        .api_key
        .or_else(|| std::env::var("LOGSENTRY_API_KEY").ok())
        .or_else(|| credentials.as_ref().map(|c| c.api_key.clone()))
        .filter(|k| !k.is_empty())
        .ok_or(SdkError::MissingCredentials)?;

    if !api_key.starts_with("sk_") {
        return Err(SdkError::Config(
            "api_key must have the sk_ prefix".into(),
        ));
    }

    let dsn = options
        .dsn
        .or_else(|| std::env::var("LOGSENTRY_URL").ok())
        .or_else(|| credentials.as_ref().map(|c| c.dsn.clone()))
        .unwrap_or_else(|| DEFAULT_DSN.to_string());

    let batch_size = options
        .batch_size
        .or_else(|| {
            std::env::var("LOGSENTRY_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(DEFAULT_BATCH_SIZE)
        .clamp(1, 1000);

    let flush_interval_seconds = options
        .flush_interval_seconds
        .or_else(|| {
            std::env::var("LOGSENTRY_FLUSH_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(DEFAULT_FLUSH_INTERVAL_SECONDS)
        .clamp(0.1, 60.0);

    let max_buffer = options
        .max_buffer
        .or_else(|| {
            std::env::var("LOGSENTRY_MAX_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(batch_size * 10);

    Ok(ResolvedConfig {
        api_key,
        dsn,
        batch_size,
        flush_interval_seconds,
        max_buffer,
    })
}
