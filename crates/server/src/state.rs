//! Shared application state passed to every API handler.

use std::sync::Arc;

use logsentry_auth::{ApiKeyRegistry, DeviceSessionStore};
use logsentry_core::config::Config;

use crate::runtime::aggregate::{AggregateIndex, RecentErrorsIndex};
use crate::runtime::classifier::Classifier;
use crate::runtime::processor::ProcessorRegistry;
use crate::runtime::store::LogStore;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core** — config
/// - **Auth** — API-key registry, device-authorization sessions
/// - **Runtime** — per-app processors, aggregate index, classifier, store
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Auth ──────────────────────────────────────────────────────────
    pub api_keys: Arc<ApiKeyRegistry>,
    pub device_sessions: Arc<DeviceSessionStore>,

    // ── Runtime ───────────────────────────────────────────────────────
    pub processors: Arc<ProcessorRegistry>,
    pub aggregates: Arc<AggregateIndex>,
    pub recent_errors: Arc<RecentErrorsIndex>,
    pub classifier: Arc<Classifier>,
    pub store: Arc<dyn LogStore>,
}
