//! Introspection HTTP server: `/ping`, `/status` and `/metrics`

use crate::{
    error::{AppError, Result},
    logging::Logger,
    log_info, log_warn,
};
use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Bind attempts before giving up; the wait grows by one second per retry
pub const BIND_ATTEMPTS: u32 = 5;

/// What the handlers report on
pub struct ServerState {
    started: Instant,
    targets: Vec<String>,
    metrics: Option<PrometheusHandle>,
}

impl ServerState {
    pub fn new(targets: Vec<String>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            started: Instant::now(),
            targets,
            metrics,
        }
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ping", get(handle_ping))
        .route("/status", get(handle_status))
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

pub async fn handle_ping(uri: Uri) -> impl IntoResponse {
    format!("ping {} at {}\n", uri, Utc::now().to_rfc3339())
}

pub async fn handle_status(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": crate::PKG_NAME,
        "version": crate::VERSION,
        "uptime_seconds": state.started.elapsed().as_secs(),
        "targets": state.targets,
        "metrics_enabled": state.metrics.is_some(),
    }))
}

pub async fn handle_metrics(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::NOT_FOUND,
            [("content-type", "text/plain; charset=utf-8")],
            "metrics publishing is disabled\n".to_string(),
        ),
    }
}

/// Bind `0.0.0.0:port`, retrying with linear backoff while the port is busy
pub async fn bind_with_retry(port: u16, logger: &Logger) -> Result<TcpListener> {
    let mut attempt = 0;
    loop {
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if attempt + 1 < BIND_ATTEMPTS => {
                attempt += 1;
                log_warn!(logger, "cannot listen on port {}: {}, retry {} of {}", port, e, attempt, BIND_ATTEMPTS - 1);
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
            }
            Err(e) => {
                return Err(AppError::network(format!("Cannot listen on port {}: {}", port, e)));
            }
        }
    }
}

/// Serve on an already bound listener until `cancel` fires
pub async fn serve(listener: TcpListener, state: Arc<ServerState>, cancel: CancellationToken, logger: Logger) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log_info!(logger, "introspection server on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
