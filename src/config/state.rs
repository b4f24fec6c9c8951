// Application state module
// Built once at startup and shared by every connection

use std::sync::Arc;

use super::types::Config;
use crate::logger::{LogLevel, LogSink, WriterSink};

/// Application state
pub struct AppState {
    pub config: Config,
    /// Logging capability used by request handlers
    pub sink: Arc<dyn LogSink>,
}

impl AppState {
    /// Create `AppState` logging through the global log writer
    pub fn new(config: &Config) -> Self {
        let level = config.logging.level.parse().unwrap_or_else(|e| {
            crate::logger::log_warning(&format!("{e}, falling back to info"));
            LogLevel::Info
        });
        Self::with_sink(config, Arc::new(WriterSink::new(level)))
    }

    /// Create `AppState` with an explicit log sink
    pub fn with_sink(config: &Config, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config: config.clone(),
            sink,
        }
    }

    pub const fn access_log_enabled(&self) -> bool {
        self.config.logging.access_log
    }
}
