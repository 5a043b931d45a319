//! Per-app ingestion pipeline (§4.H): one long-lived task per `app_id`
//! owning a bounded inbound channel, folding records into the rolling
//! health aggregate, classifying best-effort, write-batching to the
//! durable store, and falling back to the degraded-mode spool after
//! repeated store failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use logsentry_core::config::Config;
use logsentry_core::model::PersistedLog;
use logsentry_core::trace::TraceEvent;
use logsentry_core::{Error, Result};
use logsentry_protocol::RecentErrorRecord;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::runtime::aggregate::{AggregateIndex, AggregateState, RecentErrorsIndex};
use crate::runtime::classifier::Classifier;
use crate::runtime::spool::Spool;
use crate::runtime::store::LogStore;

/// Owns the map of per-app inbound channels, lazily spawning the owning
/// task on first ingest for a given `app_id`.
pub struct ProcessorRegistry {
    senders: RwLock<HashMap<Uuid, mpsc::Sender<Vec<PersistedLog>>>>,
    aggregates: Arc<AggregateIndex>,
    recent_errors: Arc<RecentErrorsIndex>,
    store: Arc<dyn LogStore>,
    classifier: Arc<Classifier>,
    config: Arc<Config>,
    shutdown: CancellationToken,
}

impl ProcessorRegistry {
    pub fn new(
        aggregates: Arc<AggregateIndex>,
        recent_errors: Arc<RecentErrorsIndex>,
        store: Arc<dyn LogStore>,
        classifier: Arc<Classifier>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            aggregates,
            recent_errors,
            store,
            classifier,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Enqueue a batch for `app_id`, waiting up to `wait` for channel
    /// capacity before giving up (§5: bounded backpressure wait).
    pub async fn enqueue(&self, app_id: Uuid, batch: Vec<PersistedLog>, wait: Duration) -> Result<()> {
        let sender = self.get_or_spawn(app_id);
        match tokio::time::timeout(wait, sender.send(batch)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) | Err(_) => Err(Error::Backpressure),
        }
    }

    fn get_or_spawn(&self, app_id: Uuid) -> mpsc::Sender<Vec<PersistedLog>> {
        if let Some(tx) = self.senders.read().get(&app_id) {
            return tx.clone();
        }
        let mut senders = self.senders.write();
        if let Some(tx) = senders.get(&app_id) {
            return tx.clone();
        }

        let (tx, rx) = mpsc::channel(self.config.ingest.channel_capacity);
        senders.insert(app_id, tx.clone());

        tokio::spawn(run(
            app_id,
            rx,
            self.aggregates.clone(),
            self.recent_errors.clone(),
            self.store.clone(),
            self.classifier.clone(),
            self.config.clone(),
            self.shutdown.clone(),
        ));

        tx
    }
}

struct DegradedState {
    spool: Spool,
    consecutive_failures: u32,
    degraded: bool,
}

async fn run(
    app_id: Uuid,
    mut rx: mpsc::Receiver<Vec<PersistedLog>>,
    aggregates: Arc<AggregateIndex>,
    recent_errors: Arc<RecentErrorsIndex>,
    store: Arc<dyn LogStore>,
    classifier: Arc<Classifier>,
    config: Arc<Config>,
    shutdown: CancellationToken,
) {
    let mut services: HashMap<String, AggregateState> = HashMap::new();
    let mut pending: Vec<PersistedLog> = Vec::new();
    let mut pending_since: Option<Instant> = None;
    let mut state = DegradedState {
        spool: Spool::new(config.spool.path.clone(), config.spool.cap_bytes, app_id),
        consecutive_failures: 0,
        degraded: false,
    };

    let mut snapshot_ticker =
        tokio::time::interval(Duration::from_secs(config.aggregate.snapshot_interval_secs));

    loop {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Some(batch) => {
                        for mut record in batch {
                            if let Some(classification) = classifier.classify(&record).await {
                                record.classification = Some(classification);
                            }
                            services
                                .entry(record.service.clone())
                                .or_insert_with(|| {
                                    AggregateState::new(record.service.clone(), config.aggregate.window_count)
                                })
                                .record(record.level, &record.fingerprint, record.ingested_at);
                            if record.level.is_error() {
                                recent_errors.push(
                                    app_id,
                                    RecentErrorRecord {
                                        timestamp: record.timestamp,
                                        service: record.service.clone(),
                                        message: record.message.clone(),
                                        fingerprint: record.fingerprint.clone(),
                                    },
                                );
                            }
                            pending.push(record);
                        }
                        if pending_since.is_none() {
                            pending_since = Some(Instant::now());
                        }
                        if should_flush(&pending, pending_since, &config) {
                            flush(app_id, &mut pending, &store, &mut state).await;
                            pending_since = None;
                        }
                    }
                    None => break,
                }
            }
            _ = snapshot_ticker.tick() => {
                for snapshot_state in services.values() {
                    let snapshot = snapshot_state.snapshot(app_id);
                    TraceEvent::AggregateSnapshotPublished {
                        app_id,
                        service: snapshot.service.clone(),
                    }
                    .emit();
                    aggregates.publish(snapshot);
                }
            }
            _ = shutdown.cancelled() => {
                flush(app_id, &mut pending, &store, &mut state).await;
                for snapshot_state in services.values() {
                    aggregates.publish(snapshot_state.snapshot(app_id));
                }
                break;
            }
        }
    }

    flush(app_id, &mut pending, &store, &mut state).await;
    for snapshot_state in services.values() {
        aggregates.publish(snapshot_state.snapshot(app_id));
    }
}

fn should_flush(pending: &[PersistedLog], since: Option<Instant>, config: &Config) -> bool {
    if pending.len() >= config.aggregate.write_batch_size {
        return true;
    }
    match since {
        Some(t) => t.elapsed() >= Duration::from_secs(config.aggregate.write_batch_max_age_secs),
        None => false,
    }
}

async fn flush(
    app_id: Uuid,
    pending: &mut Vec<PersistedLog>,
    store: &Arc<dyn LogStore>,
    state: &mut DegradedState,
) {
    if pending.is_empty() && state.spool.is_empty() {
        return;
    }

    if state.degraded {
        let mut backlog = state.spool.drain_all();
        backlog.append(pending);
        match store.write_batch(app_id, &backlog).await {
            Ok(()) => {
                state.degraded = false;
                state.consecutive_failures = 0;
                tracing::info!(app_id = %app_id, "store recovered, resuming normal writes");
                TraceEvent::ProcessorRecovered { app_id }.emit();
            }
            Err(e) => {
                tracing::warn!(app_id = %app_id, error = %e, "store still failing, re-spooling");
                state.spool.push_batch(backlog);
            }
        }
        return;
    }

    if pending.is_empty() {
        return;
    }

    match store.write_batch(app_id, pending).await {
        Ok(()) => {
            pending.clear();
            state.consecutive_failures = 0;
        }
        Err(e) => {
            state.consecutive_failures += 1;
            tracing::warn!(
                app_id = %app_id,
                error = %e,
                consecutive_failures = state.consecutive_failures,
                "store write failed"
            );
            if state.consecutive_failures >= 10 {
                state.degraded = true;
                state.spool.push_batch(std::mem::take(pending));
                tracing::warn!(app_id = %app_id, "entering degraded mode, shunting to spool");
                TraceEvent::ProcessorDegraded {
                    app_id,
                    consecutive_failures: state.consecutive_failures,
                }
                .emit();
            }
        }
    }
}
