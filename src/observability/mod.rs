//! Logging setup and the in-process counters served at `/metrics`.

pub mod metrics;
pub mod tracing;

pub use metrics::MetricsRegistry;
pub use tracing::{init_tracing, LogFormat};
