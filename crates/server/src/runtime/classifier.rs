//! Best-effort external classification (§4.H, §5).
//!
//! Never blocks persistence: a missing endpoint, a full semaphore, a
//! timeout, or a non-2xx response all fall through to "unclassified"
//! rather than delaying the write-batch.

use std::sync::Arc;
use std::time::Duration;

use logsentry_core::model::PersistedLog;
use logsentry_core::trace::TraceEvent;
use tokio::sync::Semaphore;

pub struct Classifier {
    http: reqwest::Client,
    endpoint: Option<String>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
}

impl Classifier {
    pub fn new(endpoint: Option<String>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            timeout,
        }
    }

    /// Attempt to classify one record. Returns `None` on any failure —
    /// no endpoint configured, semaphore exhausted, timeout, transport
    /// error, or malformed response.
    pub async fn classify(&self, record: &PersistedLog) -> Option<String> {
        let endpoint = self.endpoint.as_ref()?;

        let Ok(_permit) = self.semaphore.try_acquire() else {
            tracing::debug!(app_id = %record.app_id, "classifier at capacity, passing through unclassified");
            TraceEvent::ClassifierFallback {
                app_id: record.app_id,
                reason: "semaphore exhausted",
            }
            .emit();
            return None;
        };

        let request = self
            .http
            .post(endpoint)
            .json(&ClassifyRequest {
                message: &record.message,
                level: record.level.as_str(),
                service: &record.service,
            })
            .send();

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(resp)) if resp.status().is_success() => resp
                .json::<ClassifyResponse>()
                .await
                .ok()
                .map(|r| r.classification),
            Ok(Ok(resp)) => {
                tracing::debug!(status = %resp.status(), "classifier returned non-success status");
                TraceEvent::ClassifierFallback {
                    app_id: record.app_id,
                    reason: "non-success status",
                }
                .emit();
                None
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "classifier request failed");
                TraceEvent::ClassifierFallback {
                    app_id: record.app_id,
                    reason: "transport error",
                }
                .emit();
                None
            }
            Err(_) => {
                tracing::debug!("classifier request timed out");
                TraceEvent::ClassifierFallback {
                    app_id: record.app_id,
                    reason: "timeout",
                }
                .emit();
                None
            }
        }
    }
}

#[derive(serde::Serialize)]
struct ClassifyRequest<'a> {
    message: &'a str,
    level: &'a str,
    service: &'a str,
}

#[derive(serde::Deserialize)]
struct ClassifyResponse {
    classification: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use logsentry_core::model::Level;
    use uuid::Uuid;

    fn sample() -> PersistedLog {
        PersistedLog {
            id: Uuid::new_v4(),
            app_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            ingested_at: Utc::now(),
            level: Level::Error,
            service: "svc".into(),
            message: "boom".into(),
            attributes: Default::default(),
            fingerprint: "fp".into(),
            classification: None,
        }
    }

    #[tokio::test]
    async fn no_endpoint_configured_returns_none() {
        let classifier = Classifier::new(None, 4, Duration::from_secs(2));
        assert_eq!(classifier.classify(&sample()).await, None);
    }

    #[tokio::test]
    async fn unreachable_endpoint_returns_none() {
        let classifier = Classifier::new(
            Some("http://127.0.0.1:1".into()),
            4,
            Duration::from_millis(200),
        );
        assert_eq!(classifier.classify(&sample()).await, None);
    }
}
