//! # cord-common
//!
//! Shared utilities including configuration, telemetry, and background task supervision.

pub mod config;
pub mod task;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{ClientConfig, ConfigError, GatewayConfig, RestConfig, StateConfig};
pub use task::TaskSupervisor;
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
