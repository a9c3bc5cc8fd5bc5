//! Threshold alerts with a minimum interval between notifications

pub mod twilio;

pub use twilio::TwilioTransport;

use crate::{
    error::Result,
    logging::Logger,
    log_debug, log_info, log_warn,
    models::metrics::msec,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Delivers an alert text to one destination
#[async_trait]
pub trait AlertTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Send `message` to `destination`, returning the provider's message ID
    async fn send(&self, message: &str, destination: &str) -> Result<String>;
}

/// Outcome of one gate evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertDecision {
    /// Total did not exceed the threshold, or alerting is off
    BelowThreshold,
    /// Breach inside the minimum interval since the last alert
    Suppressed,
    /// Breach accepted but no transport or recipient is configured
    NoTransport,
    Dispatched { delivered: usize, failed: usize },
}

/// Decides whether a measurement triggers an alert.
///
/// One gate per target. The last-alert time is advanced before delivery
/// is attempted, so a breach with nowhere to send still starts a new
/// interval.
pub struct AlertGate {
    threshold: Duration,
    min_interval: Duration,
    last_alert: Mutex<Option<DateTime<Utc>>>,
    transport: Option<Arc<dyn AlertTransport>>,
    recipients: Vec<String>,
    logger: Logger,
}

impl AlertGate {
    /// A zero `threshold` disables alerting
    pub fn new(threshold: Duration, min_interval: Duration, logger: Logger) -> Self {
        Self {
            threshold,
            min_interval,
            last_alert: Mutex::new(None),
            transport: None,
            recipients: Vec::new(),
            logger,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn AlertTransport>, recipients: Vec<String>) -> Self {
        self.transport = Some(transport);
        self.recipients = recipients;
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.threshold.is_zero()
    }

    pub fn last_alert(&self) -> Option<DateTime<Utc>> {
        *self.last_alert.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check `total` against the threshold and notify when allowed
    pub async fn evaluate(&self, total: Duration, destination: &str, start: DateTime<Utc>) -> AlertDecision {
        if !self.is_enabled() || total <= self.threshold {
            return AlertDecision::BelowThreshold;
        }

        let message = format!(
            "response time {:.3}ms on {} exceeds threshold {:.3}ms",
            msec(total),
            destination,
            msec(self.threshold)
        );
        log_info!(self.logger, "{}", message);

        if !self.try_claim(start) {
            log_debug!(self.logger, "too soon to send another alert");
            return AlertDecision::Suppressed;
        }

        let transport = match &self.transport {
            Some(transport) if !self.recipients.is_empty() => transport,
            _ => {
                log_warn!(self.logger, "nowhere to send notification for {}", destination);
                return AlertDecision::NoTransport;
            }
        };

        let message = message.as_str();
        let sends = self
            .recipients
            .iter()
            .map(|recipient| async move { (recipient, transport.send(message, recipient).await) });
        let results = futures::future::join_all(sends).await;

        let mut delivered = 0;
        let mut failed = 0;
        for (recipient, result) in results {
            match result {
                Ok(id) => {
                    delivered += 1;
                    self.logger
                        .info("alert delivered")
                        .field("transport", transport.name())
                        .field("recipient", recipient)
                        .field("message_id", id)
                        .log()
                        .await;
                }
                Err(e) => {
                    failed += 1;
                    self.logger
                        .warn(&format!("alert delivery to {} failed: {}", recipient, e))
                        .error_info(&e)
                        .log()
                        .await;
                }
            }
        }

        AlertDecision::Dispatched { delivered, failed }
    }

    /// Advance the last-alert time to `start` unless still inside the interval
    fn try_claim(&self, start: DateTime<Utc>) -> bool {
        let mut last = self.last_alert.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = *last {
            let elapsed = start - previous;
            if elapsed < chrono::Duration::from_std(self.min_interval).unwrap_or(chrono::Duration::MAX) {
                return false;
            }
        }
        *last = Some(start);
        true
    }
}
