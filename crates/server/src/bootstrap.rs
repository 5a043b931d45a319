//! `AppState` construction, extracted from `main.rs` so CLI commands other
//! than `serve` (e.g. `doctor`) can stand up the same runtime without an
//! HTTP listener.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Duration as ChronoDuration;
use rand::RngCore;

use logsentry_auth::{ApiKeyRegistry, DeviceSessionStore};
use logsentry_core::config::{Config, ConfigSeverity};

use crate::runtime::aggregate::{AggregateIndex, RecentErrorsIndex};
use crate::runtime::classifier::Classifier;
use crate::runtime::processor::ProcessorRegistry;
use crate::runtime::store::FileLogStore;
use crate::state::AppState;

/// Validate config and wire every subsystem into a fully-built [`AppState`].
/// Shared by `serve` and `doctor`.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let pepper = resolve_pepper(&config.admin.pepper_env);
    let api_keys = Arc::new(ApiKeyRegistry::new(pepper));
    tracing::info!("api key registry ready");

    let device_sessions = Arc::new(DeviceSessionStore::new(
        ChronoDuration::seconds(config.device_auth.session_ttl_secs),
        Duration::from_secs(config.device_auth.poll_interval_secs),
    ));
    tracing::info!(
        ttl_secs = config.device_auth.session_ttl_secs,
        "device session store ready"
    );

    let aggregates = Arc::new(AggregateIndex::new());
    let recent_errors = Arc::new(RecentErrorsIndex::new());

    let classifier = Arc::new(Classifier::new(
        config.classifier.endpoint.clone(),
        config.classifier.max_concurrent,
        Duration::from_millis(config.classifier.timeout_ms),
    ));
    if config.classifier.endpoint.is_some() {
        tracing::info!("classifier ready");
    } else {
        tracing::info!("no classifier endpoint configured — records pass through unclassified");
    }

    let logs_path = config.server.data_path.join("logs");
    std::fs::create_dir_all(&logs_path)
        .with_context(|| format!("creating log store directory {}", logs_path.display()))?;
    let store = Arc::new(FileLogStore::new(logs_path));
    tracing::info!("file log store ready");

    let processors = Arc::new(ProcessorRegistry::new(
        aggregates.clone(),
        recent_errors.clone(),
        store.clone(),
        classifier.clone(),
        config.clone(),
    ));
    tracing::info!("processor registry ready");

    Ok(AppState {
        config,
        api_keys,
        device_sessions,
        processors,
        aggregates,
        recent_errors,
        classifier,
        store,
    })
}

/// Run config validation, logging every issue, and bail if any are fatal.
pub fn validate_or_bail(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }
    Ok(())
}

/// Source the API-key pepper from the configured env var, falling back to
/// an ephemeral process-local value (already warned about by `validate`).
fn resolve_pepper(env_var: &str) -> Vec<u8> {
    if let Ok(value) = std::env::var(env_var) {
        if !value.is_empty() {
            return value.into_bytes();
        }
    }
    let mut bytes = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
