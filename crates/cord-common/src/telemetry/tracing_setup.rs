//! Tracing and logging setup
//!
//! Configures the `tracing` subscriber with environment-based filtering.
//! Library crates only emit events; binaries and tests call
//! [`try_init_tracing`] once.

use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level used when `RUST_LOG` is not set
    pub level: Level,
    /// Enable JSON output format
    pub json: bool,
    /// Include span events (new, close)
    pub span_events: bool,
    /// Include file and line numbers
    pub file_line: bool,
    /// Include thread names
    pub thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            span_events: false,
            file_line: true,
            thread_names: false,
        }
    }
}

impl TracingConfig {
    /// Debug logging with span events, for local runs
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            json: false,
            span_events: true,
            file_line: true,
            thread_names: true,
        }
    }

    /// JSON logging for log shippers
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json: true,
            span_events: false,
            file_line: false,
            thread_names: false,
        }
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let span_events = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let layer = fmt::layer()
            .with_file(self.file_line)
            .with_line_number(self.file_line)
            .with_thread_names(self.thread_names)
            .with_span_events(span_events);

        if self.json {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    }
}

/// Try to initialize tracing with the default configuration
///
/// Uses `RUST_LOG` for filtering if set, otherwise "info".
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(&TracingConfig::default())
}

/// Try to initialize tracing with custom configuration
///
/// Safe to call more than once; later calls return `AlreadyInitialized`.
pub fn try_init_tracing_with_config(config: &TracingConfig) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(config.fmt_layer())
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)
}

/// Tracing initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
