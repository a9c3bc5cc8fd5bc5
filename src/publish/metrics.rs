//! Prometheus metrics sink
//!
//! Uses a recorder owned by the publisher instead of a global one, so two
//! publishers (or parallel tests) never share series.

use super::MeasurementSink;
use crate::{error::Result, models::Measurement};
use async_trait::async_trait;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

/// One response-time sample as handed to the metrics backend
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub location: String,
    pub destination: String,
    /// `%03d` of the HTTP code, `"0"` for a failed attempt
    pub response_code: String,
    pub value_ms: f64,
    pub metric_name: String,
    pub namespace: String,
}

impl MetricPoint {
    pub fn from_measurement(m: &Measurement, location: &str, metric_name: &str, namespace: &str) -> Self {
        Self {
            location: location.to_string(),
            destination: m.destination().to_string(),
            response_code: m.response_code_label(),
            value_ms: m.total_ms(),
            metric_name: metric_name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    /// Full series name, `<namespace>_<metric_name>`
    pub fn series(&self) -> String {
        series_name(&self.namespace, &self.metric_name)
    }
}

fn series_name(namespace: &str, name: &str) -> String {
    let raw = format!("{}_{}", namespace, name);
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect()
}

/// Records response times into a Prometheus histogram
pub struct PrometheusPublisher {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    metric_name: String,
    namespace: String,
}

impl PrometheusPublisher {
    pub fn new(metric_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        Self {
            recorder,
            handle,
            metric_name: metric_name.into(),
            namespace: namespace.into(),
        }
    }

    /// Record one point
    pub fn publish_point(&self, point: &MetricPoint) {
        metrics::with_local_recorder(&self.recorder, || {
            histogram!(
                point.series(),
                "destination" => point.destination.clone(),
                "response_code" => point.response_code.clone(),
                "location" => point.location.clone()
            )
            .record(point.value_ms);
        });
    }

    /// Prometheus text exposition of everything recorded so far
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn handle(&self) -> PrometheusHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl MeasurementSink for PrometheusPublisher {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn publish(&self, measurement: &Measurement, location: &str) -> Result<()> {
        let point = MetricPoint::from_measurement(measurement, location, &self.metric_name, &self.namespace);
        self.publish_point(&point);
        Ok(())
    }

    fn record_failure(&self, destination: &str) {
        let series = series_name(&self.namespace, "fetch_failures_total");
        metrics::with_local_recorder(&self.recorder, || {
            counter!(series, "destination" => destination.to_string()).increment(1);
        });
    }
}
