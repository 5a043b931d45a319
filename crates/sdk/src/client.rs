//! Top-level SDK handle: `init`, `flush`, `shutdown` (§4.D-F).

use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::buffer::RecordBuffer;
use crate::config::{self, InitOptions, ResolvedConfig};
use crate::flusher::Flusher;
use crate::tap::{BufferSlot, LogTap};
use crate::types::SdkError;

const DEFAULT_TAP_THRESHOLD: tracing::Level = tracing::Level::INFO;

/// The process-wide tap indirection. Created once, on the first `init()`;
/// every subsequent `init()` swaps the `Arc<RecordBuffer>` behind it instead
/// of registering a second `tracing_subscriber::Layer`.
static TAP_SLOT: OnceLock<BufferSlot> = OnceLock::new();
/// Shutdown handle for whichever flusher is currently active, so a second
/// `init()` can stop the previous one before starting its own.
static ACTIVE_SHUTDOWN: Mutex<Option<CancellationToken>> = Mutex::new(None);

fn tap_slot() -> &'static BufferSlot {
    TAP_SLOT.get_or_init(|| {
        let placeholder = Arc::new(RecordBuffer::new(1));
        let slot: BufferSlot = Arc::new(RwLock::new(placeholder));
        let tap = LogTap::new(slot.clone(), DEFAULT_TAP_THRESHOLD, "default".into());
        if tracing_subscriber::registry().with(tap).try_init().is_err() {
            eprintln!(
                "logsentry: a global tracing subscriber is already installed; \
                 automatic log capture is disabled for this process"
            );
        }
        slot
    })
}

/// A running SDK instance. Dropping it does not stop the flusher — call
/// [`Client::shutdown`] for a graceful drain.
pub struct Client {
    buffer: Arc<RecordBuffer>,
    flush_requested: Arc<Notify>,
    shutdown: CancellationToken,
    config: ResolvedConfig,
}

impl Client {
    pub fn builder() -> crate::builder::SdkBuilder {
        crate::builder::SdkBuilder::new()
    }

    /// `init(api_key?, dsn?, batch_size?, flush_interval_seconds?, max_buffer?)`
    /// (§4.D-F). Idempotent: calling twice replaces configuration, signals
    /// the previous flusher to drain on a best-effort basis, and never
    /// installs a second tap.
    pub async fn init(options: InitOptions) -> Result<Client, SdkError> {
        let resolved = config::resolve(options)?;

        if let Some(prev) = ACTIVE_SHUTDOWN.lock().take() {
            prev.cancel();
        }

        let buffer = Arc::new(RecordBuffer::new(resolved.max_buffer));
        *tap_slot().write() = buffer.clone();

        let shutdown = CancellationToken::new();
        let flush_requested = Arc::new(Notify::new());
        *ACTIVE_SHUTDOWN.lock() = Some(shutdown.clone());

        let flusher = Flusher::new(
            buffer.clone(),
            resolved.clone(),
            flush_requested.clone(),
            shutdown.clone(),
        );
        tokio::spawn(flusher.run());

        Ok(Client {
            buffer,
            flush_requested,
            shutdown,
            config: resolved,
        })
    }

    /// Request an out-of-band flush; returns immediately. The flusher wakes
    /// and drains whatever is currently buffered.
    pub fn flush(&self) {
        self.flush_requested.notify_one();
    }

    /// Signal shutdown and wait up to `timeout` for the flusher's drain
    /// (§4.E "Shutdown", §5 "Cancellation"). Records still undelivered after
    /// the budget are dropped.
    pub async fn shutdown(&self, timeout: std::time::Duration) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(timeout, async {
            while !self.buffer.is_empty() {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        })
        .await;
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }
}
