//! Measurement sinks beyond stdout

pub mod metrics;
pub mod webhook;

pub use self::metrics::{MetricPoint, PrometheusPublisher};
pub use webhook::{parse_webhook_url, WebhookPublisher};

use crate::{error::Result, models::Measurement};
use async_trait::async_trait;

/// Receives every successful measurement of every target.
///
/// Delivery errors are reported to the caller, which logs them and carries on.
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, measurement: &Measurement, location: &str) -> Result<()>;

    /// Note a failed fetch attempt for `destination`
    fn record_failure(&self, _destination: &str) {}
}
