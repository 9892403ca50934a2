//! Telemetry and logging infrastructure
//!
//! Provides structured logging with tracing and playback counters.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig};
pub use metrics::{PlaybackMetrics, PlaybackStats};
