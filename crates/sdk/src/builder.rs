//! Fluent builder over [`crate::config::InitOptions`], mirroring the
//! precedence rules in §4.F without forcing every caller to build the
//! struct literal by hand.

use crate::client::Client;
use crate::config::InitOptions;
use crate::types::SdkError;

#[derive(Debug, Clone, Default)]
pub struct SdkBuilder {
    options: InitOptions,
}

impl SdkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.options.api_key = Some(key.into());
        self
    }

    pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
        self.options.dsn = Some(dsn.into());
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.options.batch_size = Some(n);
        self
    }

    pub fn flush_interval_seconds(mut self, secs: f64) -> Self {
        self.options.flush_interval_seconds = Some(secs);
        self
    }

    pub fn max_buffer(mut self, n: usize) -> Self {
        self.options.max_buffer = Some(n);
        self
    }

    /// Resolve configuration, install the log tap, and start the flusher
    /// task. Idempotent: a second call on the same process replaces the
    /// active configuration (§4.D-E contract).
    pub async fn init(self) -> Result<Client, SdkError> {
        Client::init(self.options).await
    }
}
