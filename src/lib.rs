//! HTTP Performance Tester
//!
//! Repeatedly fetches HTTP(S) targets and splits every request into DNS,
//! TCP connect, TLS handshake, time-to-first-byte and body-transfer phases.
//! Measurements go to stdout as TSV or JSON and optionally to Prometheus
//! metrics, a JSON webhook and SMS alerts.

pub mod alert;
pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod dns;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod publish;
pub mod server;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, Measurement, MeasurementRecord};
pub use stats::{RunningSummary, SummaryReport};
pub use output::{JsonFormatter, OutputFormatter, ReportWriter, TsvFormatter};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);
    pub const DEFAULT_MAX_FAILURES: u32 = 10;
    pub const DEFAULT_ALERT_INTERVAL: Duration = Duration::from_secs(300);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const MAX_TIMEOUT_SECS: u64 = 300;
    pub const DEFAULT_METRIC_NAME: &str = "resp_time_ms";
    pub const DEFAULT_METRIC_NAMESPACE: &str = "http_perf";
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    pub const USER_AGENT: &str = concat!("http-perftest/", env!("CARGO_PKG_VERSION"));
}
