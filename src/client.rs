//! Instrumented HTTP exchange with per-phase timing

pub mod clock;
pub mod tls;

#[cfg(test)]
mod integration_tests;

use crate::{
    dns::Resolver,
    error::{AppError, Result},
    models::Measurement,
    types::Target,
};
use async_trait::async_trait;
use bytes::Bytes;
use clock::{Phase, PhaseClock};
use http_body_util::{BodyExt, Empty};
use hyper::{
    header::{CONNECTION, HOST, USER_AGENT},
    Method, Request,
};
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// One fetch attempt against a target
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Perform exactly one GET and time its phases.
    ///
    /// Returns a complete measurement or an error, never a partial result.
    async fn fetch(&self, target: &Target, location: Option<&str>) -> Result<Measurement>;
}

/// Fetcher that drives DNS, TCP, TLS and HTTP/1.1 by hand so that every
/// phase boundary can be observed.
#[derive(Clone)]
pub struct InstrumentedFetch {
    resolver: Resolver,
    tls_config: Arc<ClientConfig>,
    timeout: Duration,
    user_agent: String,
}

impl InstrumentedFetch {
    /// Create a fetcher using the system resolver and web PKI roots
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            resolver: Resolver::from_system(),
            tls_config: tls::default_client_config()?,
            timeout,
            user_agent: crate::defaults::USER_AGENT.to_string(),
        })
    }

    /// Replace the resolver
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the TLS client configuration
    pub fn with_tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls_config = config;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, target: &Target, clock: &mut PhaseClock) -> Result<Exchange> {
        let ip = self.resolver.resolve(target.host()).await?;
        clock.mark(Phase::Dns);

        let tcp = TcpStream::connect(SocketAddr::new(ip, target.port())).await?;
        // not fatal, only affects small-write latency
        let _ = tcp.set_nodelay(true);
        clock.mark(Phase::Tcp);

        let mut exchange = if target.is_tls() {
            let server_name = tls::server_name(target.host())?;
            let stream = tls::connector(self.tls_config.clone())
                .connect(server_name, tcp)
                .await
                .map_err(|e| AppError::tls(format!("TLS handshake with {} failed: {}", target.host_str(), e)))?;
            clock.mark(Phase::Tls);
            self.exchange(stream, target, clock).await?
        } else {
            self.exchange(tcp, target, clock).await?
        };

        exchange.remote_address = ip.to_string();
        Ok(exchange)
    }

    /// Send the request on an established stream and drain the response
    async fn exchange<IO>(&self, io: IO, target: &Target, clock: &mut PhaseClock) -> Result<Exchange>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, connection) =
            hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(TokioIo::new(io)).await?;
        let connection = tokio::spawn(connection);

        let request = Request::builder()
            .method(Method::GET)
            .uri(target.request_target())
            .header(HOST, target.authority())
            .header(USER_AGENT, self.user_agent.as_str())
            .header(CONNECTION, "close")
            .body(Empty::<Bytes>::new())?;

        let response = sender.send_request(request).await?;
        clock.mark(Phase::FirstByte);

        let status = response.status().as_u16();
        let mut body = response.into_body();
        let mut body_bytes = 0u64;
        while let Some(frame) = body.frame().await {
            if let Some(data) = frame?.data_ref() {
                body_bytes += data.len() as u64;
            }
        }

        drop(sender);
        connection
            .await
            .map_err(|e| AppError::internal(format!("Connection task failed: {}", e)))??;
        clock.mark(Phase::LastByte);

        Ok(Exchange {
            status,
            body_bytes,
            remote_address: String::new(),
        })
    }
}

struct Exchange {
    status: u16,
    body_bytes: u64,
    remote_address: String,
}

#[async_trait]
impl Fetch for InstrumentedFetch {
    async fn fetch(&self, target: &Target, location: Option<&str>) -> Result<Measurement> {
        let mut clock = PhaseClock::start();

        let exchange = tokio::time::timeout(self.timeout, self.attempt(target, &mut clock))
            .await
            .map_err(|_| {
                AppError::timeout(format!(
                    "Request to {} timed out after {:?}",
                    target.destination(),
                    self.timeout
                ))
            })??;

        let d = clock.durations();
        Ok(Measurement::new(target.destination(), clock.started_at())
            .with_location(location)
            .with_phases(d.dns_lookup, d.tcp_handshake, d.tls_handshake, d.first_byte, d.last_byte)
            .with_response(i32::from(exchange.status), exchange.body_bytes)
            .with_remote_address(exchange.remote_address))
    }
}
