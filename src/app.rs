//! Wires configuration, sinks, server and coordinator into one run

use crate::{
    alert::twilio::TwilioTransport,
    client::InstrumentedFetch,
    config::display_config_summary,
    error::Result,
    executor::{Coordinator, StopReason, TargetOutcome},
    logging::{Logger, LoggerFactory},
    log_debug, log_error, log_info, log_warn,
    models::Config,
    output::ReportWriter,
    publish::{parse_webhook_url, PrometheusPublisher, WebhookPublisher},
    server::{self, ServerState},
};
use std::sync::Arc;
use tokio::signal;

/// One configured run of the probe
pub struct App {
    config: Config,
    warnings: Vec<String>,
    loggers: LoggerFactory,
}

impl App {
    /// `warnings` are logged once the logger exists
    pub fn new(config: Config, warnings: Vec<String>) -> Self {
        let loggers = LoggerFactory::new(config.clone());
        Self {
            config,
            warnings,
            loggers,
        }
    }

    /// Run until every target stops or a shutdown signal arrives
    pub async fn run(self) -> Result<Vec<TargetOutcome>> {
        let logger = self.loggers.create_logger("MAIN").await;
        log_info!(logger, "{} v{} starting, session {}", crate::PKG_NAME, crate::VERSION, self.loggers.session_id());
        for warning in &self.warnings {
            log_warn!(logger, "{}", warning);
        }
        log_debug!(logger, "configuration:\n{}", display_config_summary(&self.config));

        let fetcher = Arc::new(InstrumentedFetch::new(self.config.timeout())?);
        let writer = Arc::new(ReportWriter::stdout(self.config.output_format));
        let mut coordinator = Coordinator::new(
            self.config.clone(),
            fetcher,
            writer,
            self.loggers.create_logger("COORD").await,
        );

        let mut metrics_handle = None;
        if self.config.publish_metrics {
            let publisher = Arc::new(PrometheusPublisher::new(
                self.config.metric_name.clone(),
                self.config.metric_namespace.clone(),
            ));
            metrics_handle = Some(publisher.handle());
            if self.config.listen_port == 0 {
                log_warn!(logger, "metrics are recorded but no listen port is set, /metrics is unreachable");
            }
            coordinator = coordinator.with_sink(publisher);
        }

        if let Some(raw) = &self.config.webhook_url {
            match parse_webhook_url(raw).and_then(WebhookPublisher::new) {
                Ok(webhook) => coordinator = coordinator.with_sink(Arc::new(webhook)),
                Err(e) => log_warn!(logger, "webhook disabled: {}", e),
            }
        }

        coordinator = self.attach_sms(coordinator, &logger).await;

        let cancel = coordinator.cancellation_token();

        let server_task = if self.config.listen_port > 0 {
            let server_logger = self.loggers.create_logger("SERVER").await;
            let listener = server::bind_with_retry(self.config.listen_port, &server_logger).await?;
            let state = Arc::new(ServerState::new(self.config.target_urls.clone(), metrics_handle));
            Some(tokio::spawn(server::serve(listener, state, cancel.clone(), server_logger)))
        } else {
            None
        };

        let signal_task = {
            let cancel = cancel.clone();
            let logger = logger.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                log_info!(logger, "shutdown requested, finishing current fetches");
                cancel.cancel();
            })
        };

        let result = coordinator.run().await;

        signal_task.abort();
        cancel.cancel();
        if let Some(task) = server_task {
            match task.await {
                Ok(Err(e)) => log_error!(logger, "introspection server failed: {}", e),
                Err(e) => log_error!(logger, "introspection server task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }

        let outcomes = result?;
        let dropped = outcomes
            .iter()
            .filter(|o| o.stop_reason == StopReason::FailureLimit)
            .count();
        log_info!(logger, "finished {} target(s), {} dropped after too many failures", outcomes.len(), dropped);
        Ok(outcomes)
    }

    async fn attach_sms(&self, coordinator: Coordinator, logger: &Logger) -> Coordinator {
        if self.config.alert_threshold_ms == 0 {
            return coordinator;
        }
        let twilio = &self.config.twilio;
        let (Some(sid), Some(token), Some(sender)) = (&twilio.account_sid, &twilio.auth_token, &twilio.sender) else {
            log_warn!(logger, "alert threshold set but Twilio is not configured, alerts will only be logged");
            return coordinator;
        };
        if twilio.receivers.is_empty() {
            log_warn!(logger, "alert threshold set but TWILIO_SMS_RECEIVERS is empty");
            return coordinator;
        }
        match TwilioTransport::new(sid.clone(), token.clone(), sender.clone()) {
            Ok(transport) => coordinator.with_alert_transport(Arc::new(transport), twilio.receivers.clone()),
            Err(e) => {
                log_warn!(logger, "SMS alerts disabled: {}", e);
                coordinator
            }
        }
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

