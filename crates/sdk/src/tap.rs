//! Log tap: a `tracing_subscriber::Layer` that mirrors emitted events into
//! the SDK's buffer (§4.D "Capture"). Installed additively alongside
//! whatever subscriber the host process already has — it never replaces it.

use std::sync::Arc;

use logsentry_core::model::{AttributeValue, Attributes, Level, LogRecord};
use parking_lot::RwLock;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::buffer::RecordBuffer;

/// Indirection cell so a second `init()` can swap in a fresh buffer without
/// re-registering a second `tracing_subscriber::Layer` (§4.D-E: "installs
/// exactly one log tap").
pub type BufferSlot = Arc<RwLock<Arc<RecordBuffer>>>;

/// Installed via `tracing_subscriber::registry().with(LogTap::new(...))`.
/// Never blocks the emitting thread: `RecordBuffer::push` is non-blocking
/// and the tap does no I/O of its own.
pub struct LogTap {
    slot: BufferSlot,
    threshold: tracing::Level,
    default_service: String,
}

impl LogTap {
    pub fn new(slot: BufferSlot, threshold: tracing::Level, default_service: String) -> Self {
        Self {
            slot,
            threshold,
            default_service,
        }
    }
}

impl<S> Layer<S> for LogTap
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.threshold {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: chrono::Utc::now(),
            level: tracing_level_to_model(*meta.level()),
            message: visitor.message.unwrap_or_else(|| meta.name().to_string()),
            service: Some(self.default_service.clone()),
            attributes: visitor.attributes,
        };

        self.slot.read().push(record);
    }
}

fn tracing_level_to_model(level: tracing::Level) -> Level {
    match level {
        tracing::Level::TRACE => Level::Trace,
        tracing::Level::DEBUG => Level::Debug,
        tracing::Level::INFO => Level::Info,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::ERROR => Level::Error,
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    attributes: Attributes,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.attributes
                .insert(field.name().to_string(), AttributeValue::String(rendered));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.attributes.insert(
                field.name().to_string(),
                AttributeValue::String(value.to_string()),
            );
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.attributes
            .insert(field.name().to_string(), AttributeValue::Number(value as f64));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.attributes
            .insert(field.name().to_string(), AttributeValue::Number(value as f64));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.attributes
            .insert(field.name().to_string(), AttributeValue::Number(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.attributes
            .insert(field.name().to_string(), AttributeValue::Bool(value));
    }
}
