//! Measurement loop for one target

use crate::{
    alert::AlertGate,
    client::Fetch,
    logging::Logger,
    log_debug, log_info,
    models::Measurement,
    output::ReportWriter,
    publish::MeasurementSink,
    stats::{RunningSummary, SummaryReport},
    types::Target,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a target stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Reached the configured number of successful measurements
    IterationLimit,
    /// Reached the maximum number of failed attempts
    FailureLimit,
    /// Shutdown was requested
    Cancelled,
}

/// Final state of one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub destination: String,
    pub successes: u64,
    pub failures: u32,
    pub stop_reason: StopReason,
    pub report: Option<SummaryReport>,
}

/// Loop policy for one target
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub delay: Duration,
    pub max_failures: u32,
    /// 0 means no limit
    pub iteration_limit: u64,
    /// Configured location label
    pub location: Option<String>,
    /// Label used when no location is configured
    pub fallback_location: String,
}

/// Drives the fetch for one target until a stop condition holds.
///
/// The failure count is never reset by a success.
pub struct TargetScheduler {
    target: Target,
    fetcher: Arc<dyn Fetch>,
    writer: Arc<ReportWriter>,
    sinks: Vec<Arc<dyn MeasurementSink>>,
    alert_gate: AlertGate,
    settings: SchedulerSettings,
    logger: Logger,
}

impl TargetScheduler {
    pub fn new(
        target: Target,
        fetcher: Arc<dyn Fetch>,
        writer: Arc<ReportWriter>,
        alert_gate: AlertGate,
        settings: SchedulerSettings,
        logger: Logger,
    ) -> Self {
        Self {
            target,
            fetcher,
            writer,
            sinks: Vec::new(),
            alert_gate,
            settings,
            logger,
        }
    }

    pub fn with_sinks(mut self, sinks: Vec<Arc<dyn MeasurementSink>>) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Run until the iteration limit, the failure limit or cancellation
    pub async fn run(self, cancel: CancellationToken) -> TargetOutcome {
        let destination = self.target.destination();
        let mut summary = RunningSummary::new();
        let mut successes = 0u64;
        let mut failures = 0u32;

        log_debug!(self.logger, "starting measurements for {}", destination);

        let stop_reason = loop {
            match self
                .fetcher
                .fetch(&self.target, self.settings.location.as_deref())
                .await
            {
                Ok(measurement) => {
                    summary.record(&measurement);
                    successes += 1;
                    self.emit(&measurement).await;
                }
                Err(e) => {
                    failures += 1;
                    for sink in &self.sinks {
                        sink.record_failure(&destination);
                    }
                    self.logger
                        .warn(&format!(
                            "fetch failure {} of {} on {}: {}",
                            failures, self.settings.max_failures, destination, e
                        ))
                        .error_info(&e)
                        .log()
                        .await;
                    if failures >= self.settings.max_failures {
                        break StopReason::FailureLimit;
                    }
                }
            }

            if self.settings.iteration_limit > 0 && successes >= self.settings.iteration_limit {
                break StopReason::IterationLimit;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                _ = tokio::time::sleep(self.settings.delay) => {}
            }
        };

        let report = summary.report(Utc::now());
        let written = match &report {
            Some(report) => self.writer.write_summary(report),
            None if stop_reason == StopReason::FailureLimit => self.writer.write_no_samples(),
            None => Ok(()),
        };
        if let Err(e) = written {
            self.logger
                .error(&format!("failed to write summary for {}: {}", destination, e))
                .error_info(&e)
                .log()
                .await;
        }

        log_info!(
            self.logger,
            "stopped {} after {} successes and {} failures ({:?})",
            destination,
            successes,
            failures,
            stop_reason
        );

        TargetOutcome {
            destination,
            successes,
            failures,
            stop_reason,
            report,
        }
    }

    /// Hand one measurement to the report, every sink and the alert gate
    async fn emit(&self, measurement: &Measurement) {
        let location = measurement.location_or(&self.settings.fallback_location);

        if self.logger.would_log(crate::logging::LogLevel::Debug) {
            self.logger
                .debug("measurement")
                .field("destination", measurement.destination())
                .timing(measurement)
                .log()
                .await;
        }

        if let Err(e) = self.writer.write_measurement(measurement, &self.settings.fallback_location) {
            self.logger
                .error(&format!("failed to write measurement: {}", e))
                .error_info(&e)
                .log()
                .await;
        }

        for sink in &self.sinks {
            if let Err(e) = sink.publish(measurement, location).await {
                self.logger
                    .warn(&format!("{} publish failed: {}", sink.name(), e))
                    .error_info(&e)
                    .log()
                    .await;
            }
        }

        self.alert_gate
            .evaluate(measurement.total(), measurement.destination(), measurement.start)
            .await;
    }
}
