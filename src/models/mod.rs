//! Data models for the probe

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::{Config, TwilioConfig};
pub use metrics::{Measurement, MeasurementRecord, RESPONSE_CODE_FAILED};
