//! # Scenaria Telemetry
//!
//! Crate for logging and metrics.

pub mod logging;
pub mod metrics;

pub use logging::{EventLogger, LoggingError};
pub use metrics::MetricsRecorder;
