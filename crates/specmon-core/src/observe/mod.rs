//! # Observability
//!
//! - **Logging**: structured `tracing` output, JSON or human readable
//! - **Metrics**: per-cause drop counters, cache and publish counters,
//!   tracked-frequency gauges and processing latency
//!
//! ```text
//!  receive path ──┐                 ┌── tracing::debug!(cause = ...)
//!                 ├── MonitorPhy ───┤
//!  query path ────┘                 └── MonitorMetrics ── snapshot() / to_prometheus()
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use metrics::{Counter, Gauge, Histogram, MetricsSnapshot, MonitorMetrics};
