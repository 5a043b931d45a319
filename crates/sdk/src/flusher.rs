//! Single background task owning the network socket (§4.D-E).
//!
//! Wakes on buffer reaching `batch_size`, `flush_interval_seconds` elapsed
//! since the oldest record, an explicit `flush()` call, or shutdown.

use std::sync::Arc;
use std::time::Duration;

use logsentry_protocol::{IngestRequest, IngestResponse, WireLogRecord};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::backoff::FlushBackoff;
use crate::buffer::RecordBuffer;
use crate::config::ResolvedConfig;

/// Wall-clock budget for the final flush attempt on shutdown (§4.E).
const SHUTDOWN_DRAIN_BUDGET: Duration = Duration::from_secs(5);
/// Per-attempt HTTP timeout (§5: "SDK flush per attempt: 10 s").
const FLUSH_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Flusher {
    buffer: Arc<RecordBuffer>,
    config: ResolvedConfig,
    http: reqwest::Client,
    backoff: FlushBackoff,
    flush_requested: Arc<Notify>,
    shutdown: CancellationToken,
}

impl Flusher {
    pub fn new(
        buffer: Arc<RecordBuffer>,
        config: ResolvedConfig,
        flush_requested: Arc<Notify>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            buffer,
            config,
            http: reqwest::Client::new(),
            backoff: FlushBackoff::default(),
            flush_requested,
            shutdown,
        }
    }

    /// Runs until `shutdown` is cancelled. Call via `tokio::spawn`.
    pub async fn run(self) {
        let poll_interval = Duration::from_secs_f64(self.config.flush_interval_seconds.min(1.0));
        let mut ticker = tokio::time::interval(poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.flush_requested.notified() => {}
                _ = self.shutdown.cancelled() => break,
            }

            while self.should_flush_now() {
                self.flush_one_batch().await;
            }
        }

        tracing::info!("flusher shutting down, attempting final drain");
        let _ = tokio::time::timeout(SHUTDOWN_DRAIN_BUDGET, async {
            while !self.buffer.is_empty() {
                self.flush_one_batch().await;
            }
        })
        .await;

        let remaining = self.buffer.len();
        if remaining > 0 {
            tracing::warn!(remaining, "dropping undelivered records at shutdown");
        }
    }

    fn should_flush_now(&self) -> bool {
        if self.buffer.len() >= self.config.batch_size {
            return true;
        }
        match self.buffer.oldest_age() {
            Some(age) => {
                age.num_milliseconds() as f64 / 1000.0 >= self.config.flush_interval_seconds
            }
            None => false,
        }
    }

    /// Drain, send, and resolve the outcome for a single batch (§4.E steps
    /// 1-6). Retries happen inline — this is the single task that owns the
    /// socket, so a retry sleep here is exactly the "flusher suspends on
    /// backoff sleep" suspension point from §5.
    async fn flush_one_batch(&self) {
        let records = self.buffer.drain_batch(self.config.batch_size);
        if records.is_empty() {
            return;
        }

        let mut attempt = 0u32;
        let mut pending = records;

        loop {
            let request = IngestRequest {
                api_key: self.config.api_key.clone(),
                logs: pending
                    .iter()
                    .cloned()
                    .map(WireLogRecord::from)
                    .collect(),
            };

            let outcome = tokio::time::timeout(
                FLUSH_ATTEMPT_TIMEOUT,
                self.http
                    .post(format!("{}/ingest", self.config.dsn))
                    .json(&request)
                    .send(),
            )
            .await;

            match outcome {
                Ok(Ok(response)) if response.status().is_success() => {
                    if let Ok(body) = response.json::<IngestResponse>().await {
                        tracing::debug!(accepted = body.accepted, "batch delivered");
                    }
                    return;
                }
                Ok(Ok(response)) if response.status().as_u16() == 429 => {
                    self.retry_or_drop(&mut pending, &mut attempt).await;
                    if pending.is_empty() {
                        return;
                    }
                }
                Ok(Ok(response)) if response.status().is_client_error() => {
                    tracing::warn!(status = %response.status(), "batch rejected, discarding");
                    return;
                }
                Ok(Ok(response)) => {
                    tracing::warn!(status = %response.status(), "server error, retrying");
                    self.retry_or_drop(&mut pending, &mut attempt).await;
                    if pending.is_empty() {
                        return;
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "network error sending batch, retrying");
                    self.retry_or_drop(&mut pending, &mut attempt).await;
                    if pending.is_empty() {
                        return;
                    }
                }
                Err(_) => {
                    tracing::warn!("flush attempt timed out, retrying");
                    self.retry_or_drop(&mut pending, &mut attempt).await;
                    if pending.is_empty() {
                        return;
                    }
                }
            }
        }
    }

    /// After a retryable failure: reinsert at the buffer head, sleep, and
    /// bump the attempt counter — unless the attempt budget is exhausted,
    /// in which case the batch is dropped and `pending` is cleared so the
    /// caller's loop exits (§4.E step 6).
    async fn retry_or_drop(&self, pending: &mut Vec<logsentry_core::model::LogRecord>, attempt: &mut u32) {
        if self.backoff.should_give_up(*attempt) {
            tracing::error!(attempts = *attempt, "dropping batch after repeated failures");
            pending.clear();
            return;
        }
        self.buffer.reinsert_at_head(std::mem::take(pending));
        let delay = self.backoff.delay_for_attempt(*attempt);
        *attempt += 1;
        tokio::time::sleep(delay).await;
        *pending = self.buffer.drain_batch(self.config.batch_size);
    }
}
