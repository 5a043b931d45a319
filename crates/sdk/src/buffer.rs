//! Bounded in-process buffer between the log tap and the flusher (§4.D).
//!
//! Enqueue is always non-blocking: on overflow the oldest record is
//! evicted, with a per-minute rate-limited WARN so a noisy process doesn't
//! spam its own console.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use logsentry_core::model::LogRecord;
use parking_lot::Mutex;

const OVERFLOW_WARN_INTERVAL: Duration = Duration::from_secs(60);

struct Inner {
    records: VecDeque<LogRecord>,
    last_overflow_warn: Option<Instant>,
}

/// Shared between the log tap (producer) and the flusher task (consumer).
pub struct RecordBuffer {
    max_buffer: usize,
    inner: Mutex<Inner>,
}

impl RecordBuffer {
    pub fn new(max_buffer: usize) -> Self {
        Self {
            max_buffer,
            inner: Mutex::new(Inner {
                records: VecDeque::new(),
                last_overflow_warn: None,
            }),
        }
    }

    /// Enqueue a record, evicting the oldest one if the buffer is full.
    /// Never blocks the calling (emitting) thread.
    pub fn push(&self, record: LogRecord) {
        let mut inner = self.inner.lock();
        if inner.records.len() >= self.max_buffer {
            inner.records.pop_front();
            let should_warn = inner
                .last_overflow_warn
                .map(|t| t.elapsed() >= OVERFLOW_WARN_INTERVAL)
                .unwrap_or(true);
            if should_warn {
                inner.last_overflow_warn = Some(Instant::now());
                eprintln!(
                    "logsentry: buffer overflow, dropping oldest records (capacity {})",
                    self.max_buffer
                );
            }
        }
        inner.records.push_back(record);
    }

    /// Drain up to `batch_size` records atomically, oldest first.
    pub fn drain_batch(&self, batch_size: usize) -> Vec<LogRecord> {
        let mut inner = self.inner.lock();
        let n = batch_size.min(inner.records.len());
        inner.records.drain(..n).collect()
    }

    /// Reinsert an undelivered batch at the head, preserving FIFO order for
    /// the next drain (§4.E step 6: "reinsert batch at the head").
    pub fn reinsert_at_head(&self, mut batch: Vec<LogRecord>) {
        let mut inner = self.inner.lock();
        for record in batch.drain(..).rev() {
            inner.records.push_front(record);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn oldest_age(&self) -> Option<chrono::Duration> {
        let inner = self.inner.lock();
        inner
            .records
            .front()
            .map(|r| chrono::Utc::now() - r.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use logsentry_core::model::Level;

    fn record(message: &str) -> LogRecord {
        LogRecord {
            timestamp: Utc::now(),
            level: Level::Info,
            message: message.into(),
            service: None,
            attributes: Default::default(),
        }
    }

    #[test]
    fn push_then_drain_preserves_fifo_order() {
        let buf = RecordBuffer::new(10);
        buf.push(record("a"));
        buf.push(record("b"));
        buf.push(record("c"));
        let drained = buf.drain_batch(10);
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].message, "a");
        assert_eq!(drained[2].message, "c");
    }

    #[test]
    fn overflow_drops_oldest() {
        let buf = RecordBuffer::new(2);
        buf.push(record("a"));
        buf.push(record("b"));
        buf.push(record("c"));
        assert_eq!(buf.len(), 2);
        let drained = buf.drain_batch(10);
        assert_eq!(drained[0].message, "b");
        assert_eq!(drained[1].message, "c");
    }

    #[test]
    fn reinsert_at_head_restores_order_for_next_drain() {
        let buf = RecordBuffer::new(10);
        buf.push(record("c"));
        buf.push(record("d"));
        let failed_batch = vec![record("a"), record("b")];
        buf.reinsert_at_head(failed_batch);
        let drained = buf.drain_batch(10);
        assert_eq!(
            drained.iter().map(|r| r.message.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c", "d"]
        );
    }

    #[test]
    fn drain_batch_respects_requested_size() {
        let buf = RecordBuffer::new(10);
        for i in 0..5 {
            buf.push(record(&i.to_string()));
        }
        let drained = buf.drain_batch(2);
        assert_eq!(drained.len(), 2);
        assert_eq!(buf.len(), 3);
    }
}
