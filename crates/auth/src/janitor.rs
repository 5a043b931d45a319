//! Background sweep of expired device sessions (§5: "swept by a janitor
//! task every 30 s").

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::device_session::DeviceSessionStore;

/// Runs until the process exits; intended to be spawned once at startup.
pub async fn run(store: Arc<DeviceSessionStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let swept = store.sweep_expired(Utc::now());
        for user_code in swept {
            tracing::info!(
                event = "device_session_expired",
                user_code = %user_code,
                "swept expired device session"
            );
        }
    }
}
