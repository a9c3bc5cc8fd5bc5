//! TLS connector setup for timed handshakes

use crate::error::{AppError, Result};
use crate::types::TargetHost;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// Client configuration trusting the bundled web PKI roots, ALPN `http/1.1`
pub fn default_client_config() -> Result<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let mut config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

pub fn connector(config: Arc<ClientConfig>) -> TlsConnector {
    TlsConnector::from(config)
}

/// SNI / verification name for a target host
pub fn server_name(host: &TargetHost) -> Result<ServerName<'static>> {
    match host {
        TargetHost::Ip(ip) => Ok(ServerName::IpAddress((*ip).into())),
        TargetHost::Domain(name) => ServerName::try_from(name.clone())
            .map_err(|e| AppError::tls(format!("Invalid TLS server name '{}': {}", name, e))),
    }
}
