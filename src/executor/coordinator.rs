//! Runs one scheduler per target under a shared shutdown signal

use super::scheduler::{SchedulerSettings, TargetOutcome, TargetScheduler};
use crate::{
    alert::{AlertGate, AlertTransport},
    client::Fetch,
    error::Result,
    logging::Logger,
    log_debug, log_error, log_info,
    models::Config,
    output::ReportWriter,
    publish::MeasurementSink,
};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Location used when neither a label nor the outbound address is known
pub const UNKNOWN_LOCATION: &str = "unknown";

/// Starts every target, propagates shutdown and collects the outcomes
pub struct Coordinator {
    config: Config,
    fetcher: Arc<dyn Fetch>,
    writer: Arc<ReportWriter>,
    sinks: Vec<Arc<dyn MeasurementSink>>,
    alert_transport: Option<Arc<dyn AlertTransport>>,
    alert_recipients: Vec<String>,
    cancel: CancellationToken,
    logger: Logger,
}

impl Coordinator {
    pub fn new(config: Config, fetcher: Arc<dyn Fetch>, writer: Arc<ReportWriter>, logger: Logger) -> Self {
        Self {
            config,
            fetcher,
            writer,
            sinks: Vec::new(),
            alert_transport: None,
            alert_recipients: Vec::new(),
            cancel: CancellationToken::new(),
            logger,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MeasurementSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_alert_transport(mut self, transport: Arc<dyn AlertTransport>, recipients: Vec<String>) -> Self {
        self.alert_transport = Some(transport);
        self.alert_recipients = recipients;
        self
    }

    /// Token observed by every scheduler; cancelling it more than once is harmless
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Run every target to completion.
    ///
    /// The header is written before the first task starts. A task that
    /// panics is logged and left out of the returned outcomes.
    pub async fn run(&self) -> Result<Vec<TargetOutcome>> {
        let targets = self.config.targets()?;

        let fallback_location = match &self.config.location {
            Some(location) => location.clone(),
            None => outbound_ip()
                .await
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
        };
        log_debug!(self.logger, "reporting location {}", fallback_location);

        self.writer.write_header_once()?;

        let mut tasks = JoinSet::new();
        for target in targets {
            let gate_logger = self.logger.named("ALERT");
            let mut gate = AlertGate::new(
                self.config.alert_threshold(),
                self.config.alert_interval(),
                gate_logger,
            );
            if let Some(transport) = &self.alert_transport {
                gate = gate.with_transport(transport.clone(), self.alert_recipients.clone());
            }

            let settings = SchedulerSettings {
                delay: self.config.delay(),
                max_failures: self.config.max_failures,
                iteration_limit: self.config.iteration_limit,
                location: self.config.location.clone(),
                fallback_location: fallback_location.clone(),
            };

            let scheduler = TargetScheduler::new(
                target,
                self.fetcher.clone(),
                self.writer.clone(),
                gate,
                settings,
                self.logger.named("SCHED"),
            )
            .with_sinks(self.sinks.clone());

            log_info!(self.logger, "starting {}", scheduler.target());
            tasks.spawn(scheduler.run(self.cancel.clone()));
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => log_error!(self.logger, "target task failed: {}", e),
            }
        }

        Ok(outcomes)
    }
}

/// Local address the OS would use to reach the public internet.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
pub async fn outbound_ip() -> Option<IpAddr> {
    let socket = tokio::net::UdpSocket::bind("0.0.0.0:0").await.ok()?;
    socket.connect("8.8.8.8:53").await.ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() {
        None
    } else {
        Some(ip)
    }
}
