//! `logsentry-sdk` — embeddable client library for applications that want
//! to ship their structured logs to a logsentry server (§4.D-F).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Host process                                             │
//! │                                                            │
//! │   tracing::info!("checkout completed", order_id = %id);    │
//! │        │                                                   │
//! │        ▼  (tap, non-blocking)                              │
//! │   RecordBuffer ──drain──▶ Flusher ──POST /ingest──▶ server │
//! │                                                            │
//! │   logsentry_sdk::Client::builder()                         │
//! │       .api_key("sk_...")                                   │
//! │       .dsn("https://ingest.example.com")                   │
//! │       .init()                                              │
//! │       .await?;                                             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! `init()` is idempotent: calling it twice on the same process replaces
//! configuration, drains the prior buffer on a best-effort basis, and
//! installs exactly one log tap (§4.D-E).

pub mod backoff;
pub mod builder;
pub mod buffer;
pub mod client;
pub mod config;
pub mod credentials;
pub mod flusher;
pub mod tap;
pub mod types;

pub use backoff::FlushBackoff;
pub use builder::SdkBuilder;
pub use client::Client;
pub use config::{InitOptions, ResolvedConfig};
pub use credentials::Credentials;
pub use types::SdkError;
