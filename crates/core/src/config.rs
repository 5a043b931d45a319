//! Server configuration: a layered, `serde`-deserializable `Config` loaded
//! from TOML with environment overrides, following the same
//! `#[serde(default)]`-per-subsection style used throughout this codebase.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub aggregate: AggregateConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub spool: SpoolConfig,
    #[serde(default)]
    pub device_auth: DeviceAuthConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default = "d_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "d_data_path")]
    pub data_path: std::path::PathBuf,
    /// Externally-reachable base URL handed to SDKs as `dsn` (§4.F, §4.I).
    #[serde(default = "d_public_dsn")]
    pub public_dsn: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            cors: CorsConfig::default(),
            rate_limit: None,
            max_concurrent_requests: d_max_concurrent_requests(),
            data_path: d_data_path(),
            public_dsn: d_public_dsn(),
        }
    }
}

fn d_public_dsn() -> String {
    "http://localhost:3210".into()
}

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_port() -> u16 {
    3210
}
fn d_max_concurrent_requests() -> usize {
    256
}
fn d_data_path() -> std::path::PathBuf {
    std::path::PathBuf::from("./data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "d_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_allowed_origins(),
        }
    }
}

fn d_allowed_origins() -> Vec<String> {
    vec!["http://localhost:*".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ingestion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Hard envelope size cap, bytes (§4.G step 3, §6.1).
    #[serde(default = "d_max_envelope_bytes")]
    pub max_envelope_bytes: usize,
    /// Hard cap on records per envelope.
    #[serde(default = "d_max_records_per_envelope")]
    pub max_records_per_envelope: usize,
    /// Per-app inbound channel capacity (§4.H).
    #[serde(default = "d_channel_capacity")]
    pub channel_capacity: usize,
    /// Bounded wait before returning 503 on a full channel (§5).
    #[serde(default = "d_enqueue_wait_ms")]
    pub enqueue_wait_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_envelope_bytes: d_max_envelope_bytes(),
            max_records_per_envelope: d_max_records_per_envelope(),
            channel_capacity: d_channel_capacity(),
            enqueue_wait_ms: d_enqueue_wait_ms(),
        }
    }
}

fn d_max_envelope_bytes() -> usize {
    1024 * 1024
}
fn d_max_records_per_envelope() -> usize {
    1000
}
fn d_channel_capacity() -> usize {
    1024
}
fn d_enqueue_wait_ms() -> u64 {
    250
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Aggregates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Window-series cap (§4.J, pinned upper bound of 360).
    #[serde(default = "d_window_count")]
    pub window_count: usize,
    /// How often the owning task publishes a new snapshot pointer.
    #[serde(default = "d_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
    #[serde(default = "d_write_batch_size")]
    pub write_batch_size: usize,
    #[serde(default = "d_write_batch_max_age_secs")]
    pub write_batch_max_age_secs: u64,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            window_count: d_window_count(),
            snapshot_interval_secs: d_snapshot_interval_secs(),
            write_batch_size: d_write_batch_size(),
            write_batch_max_age_secs: d_write_batch_max_age_secs(),
        }
    }
}

fn d_window_count() -> usize {
    360
}
fn d_snapshot_interval_secs() -> u64 {
    2
}
fn d_write_batch_size() -> usize {
    200
}
fn d_write_batch_max_age_secs() -> u64 {
    2
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classifier
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// External classification endpoint. Unset disables classification
    /// entirely — every record passes through unclassified (§4.H).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "d_classifier_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_classifier_concurrency")]
    pub max_concurrent: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: d_classifier_timeout_ms(),
            max_concurrent: d_classifier_concurrency(),
        }
    }
}

fn d_classifier_timeout_ms() -> u64 {
    2_000
}
fn d_classifier_concurrency() -> usize {
    16
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Degraded-mode spool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolConfig {
    #[serde(default = "d_spool_path")]
    pub path: std::path::PathBuf,
    #[serde(default = "d_spool_cap_bytes")]
    pub cap_bytes: u64,
    #[serde(default = "d_store_write_failures_before_degraded")]
    pub failures_before_degraded: u32,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            path: d_spool_path(),
            cap_bytes: d_spool_cap_bytes(),
            failures_before_degraded: d_store_write_failures_before_degraded(),
        }
    }
}

fn d_spool_path() -> std::path::PathBuf {
    std::path::PathBuf::from("./data/spool")
}
fn d_spool_cap_bytes() -> u64 {
    256 * 1024 * 1024
}
fn d_store_write_failures_before_degraded() -> u32 {
    10
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Device authorization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthConfig {
    #[serde(default = "d_device_session_ttl_secs")]
    pub session_ttl_secs: i64,
    #[serde(default = "d_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "d_janitor_interval_secs")]
    pub janitor_interval_secs: u64,
    #[serde(default = "d_verification_url")]
    pub verification_url: String,
}

impl Default for DeviceAuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: d_device_session_ttl_secs(),
            poll_interval_secs: d_poll_interval_secs(),
            janitor_interval_secs: d_janitor_interval_secs(),
            verification_url: d_verification_url(),
        }
    }
}

fn d_device_session_ttl_secs() -> i64 {
    600
}
fn d_poll_interval_secs() -> u64 {
    2
}
fn d_janitor_interval_secs() -> u64 {
    30
}
fn d_verification_url() -> String {
    "http://localhost:3210/device".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the per-installation API-key pepper
    /// (§4.A). If unset, a process-local random pepper is generated and
    /// a warning logged — acceptable for development, not production.
    #[serde(default = "d_pepper_env")]
    pub pepper_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            pepper_env: d_pepper_env(),
        }
    }
}

fn d_pepper_env() -> String {
    "LOGSENTRY_PEPPER".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means the configuration is ready to serve.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
        }

        if self.ingest.max_records_per_envelope == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "ingest.max_records_per_envelope".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.ingest.max_envelope_bytes == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "ingest.max_envelope_bytes".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.aggregate.window_count == 0 || self.aggregate.window_count > 360 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "aggregate.window_count".into(),
                message: "must be in (0, 360] per the pinned series upper bound".into(),
            });
        }

        if self.classifier.max_concurrent == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "classifier.max_concurrent".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.device_auth.session_ttl_secs <= 0 || self.device_auth.session_ttl_secs > 900 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "device_auth.session_ttl_secs".into(),
                message: "must be in (0, 900] seconds (expires_at - created_at <= 15 min)".into(),
            });
        }

        if std::env::var(&self.admin.pepper_env).is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "admin.pepper_env".into(),
                message: format!(
                    "{} is unset — using an ephemeral process-local pepper (development only)",
                    self.admin.pepper_env
                ),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_errors() {
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn zero_port_is_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "server.port" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn window_count_over_360_is_error() {
        let mut cfg = Config::default();
        cfg.aggregate.window_count = 361;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "aggregate.window_count" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn session_ttl_over_15_minutes_is_error() {
        let mut cfg = Config::default();
        cfg.device_auth.session_ttl_secs = 901;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "device_auth.session_ttl_secs"));
    }

    #[test]
    fn cors_wildcard_is_warning_not_error() {
        let mut cfg = Config::default();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "server.cors.allowed_origins")
            .expect("expected CORS wildcard issue");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] server.port: port must be greater than 0"
        );
    }
}
