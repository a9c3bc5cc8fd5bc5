//! Instrumented fetch against mock servers
//!
//! Covers phase accounting, body draining and the failure paths of a
//! single attempt.

use super::*;
use std::time::Duration;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Mock HTTP server for controlled testing scenarios
struct MockHttpServer {
    server: MockServer,
}

impl MockHttpServer {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    fn target(&self, request_path: &str) -> Target {
        Target::parse(&format!("{}{}", self.server.uri(), request_path)).unwrap()
    }

    async fn mock(&self, request_path: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }
}

fn create_test_fetch(timeout: Duration) -> InstrumentedFetch {
    InstrumentedFetch::new(timeout).unwrap()
}

#[tokio::test]
async fn test_plain_http_success() {
    let server = MockHttpServer::new().await;
    server
        .mock("/health", ResponseTemplate::new(200).set_body_string("hello"))
        .await;

    let fetch = create_test_fetch(Duration::from_secs(5));
    let m = fetch.fetch(&server.target("/health"), Some("lab")).await.unwrap();

    assert_eq!(m.response_code, 200);
    assert_eq!(m.body_bytes, 5);
    assert_eq!(m.tls_handshake, Duration::ZERO);
    assert_eq!(m.remote_address, "127.0.0.1");
    assert_eq!(m.location.as_deref(), Some("lab"));
    assert!(m.destination().ends_with("/health"));
}

#[tokio::test]
async fn test_total_equals_phase_sum() {
    let server = MockHttpServer::new().await;
    server.mock("/", ResponseTemplate::new(204)).await;

    let fetch = create_test_fetch(Duration::from_secs(5));
    let m = fetch.fetch(&server.target("/"), None).await.unwrap();

    assert_eq!(m.total(), m.dns_lookup + m.tcp_handshake + m.tls_handshake + m.first_byte + m.last_byte);
    assert_eq!(m.body_bytes, 0);
}

#[tokio::test]
async fn test_error_status_body_is_drained() {
    let server = MockHttpServer::new().await;
    server
        .mock("/broken", ResponseTemplate::new(503).set_body_string("x".repeat(64 * 1024)))
        .await;

    let fetch = create_test_fetch(Duration::from_secs(5));
    let m = fetch.fetch(&server.target("/broken"), None).await.unwrap();

    assert_eq!(m.response_code, 503);
    assert_eq!(m.body_bytes, 64 * 1024);
}

#[tokio::test]
async fn test_server_delay_lands_in_first_byte() {
    let server = MockHttpServer::new().await;
    server
        .mock("/slow", ResponseTemplate::new(200).set_delay(Duration::from_millis(150)))
        .await;

    let fetch = create_test_fetch(Duration::from_secs(5));
    let m = fetch.fetch(&server.target("/slow"), None).await.unwrap();

    assert!(m.first_byte >= Duration::from_millis(150), "first byte was {:?}", m.first_byte);
    assert!(m.tcp_handshake < Duration::from_millis(150));
}

#[tokio::test]
async fn test_request_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/q"))
        .and(header("connection", "close"))
        .and(header("user-agent", crate::defaults::USER_AGENT))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let target = Target::parse(&format!("{}/q?verbose=1", server.uri())).unwrap();
    let m = create_test_fetch(Duration::from_secs(5)).fetch(&target, None).await.unwrap();
    assert_eq!(m.response_code, 200);
}

#[tokio::test]
async fn test_timeout_is_reported() {
    let server = MockHttpServer::new().await;
    server
        .mock("/hang", ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .await;

    let fetch = create_test_fetch(Duration::from_millis(200));
    let err = fetch.fetch(&server.target("/hang"), None).await.unwrap_err();
    assert!(matches!(err, AppError::Timeout(_)), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn test_connection_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let target = Target::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
    let err = create_test_fetch(Duration::from_secs(2)).fetch(&target, None).await.unwrap_err();
    assert!(matches!(err, AppError::Network(_)), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn test_tls_failure_against_plain_server() {
    let server = MockHttpServer::new().await;
    let plain = server.target("/");
    let tls_target = Target::parse(&format!("https://127.0.0.1:{}/", plain.port())).unwrap();

    let err = create_test_fetch(Duration::from_secs(2)).fetch(&tls_target, None).await.unwrap_err();
    assert!(matches!(err, AppError::Tls(_)), "unexpected error: {:?}", err);
}

/// One-shot HTTPS server with a fresh self-signed certificate for 127.0.0.1.
/// Returns its port and a client config that trusts only that certificate.
async fn spawn_tls_server(body: &'static str) -> (u16, Arc<ClientConfig>) {
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
    let cert_der: CertificateDer<'static> = cert.der().clone();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut server_config = rustls::ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der)
        .unwrap();
    server_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert_der).unwrap();
    let mut client_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    client_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut tls = acceptor.accept(tcp).await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = tls.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        tls.write_all(response.as_bytes()).await.unwrap();
        tls.shutdown().await.unwrap();
    });

    (port, Arc::new(client_config))
}

#[tokio::test]
async fn test_https_success_times_the_handshake() {
    let (port, client_config) = spawn_tls_server("hello").await;
    let target = Target::parse(&format!("https://127.0.0.1:{}/secure", port)).unwrap();

    let fetch = create_test_fetch(Duration::from_secs(5)).with_tls_config(client_config);
    let m = fetch.fetch(&target, None).await.unwrap();

    assert_eq!(m.response_code, 200);
    assert_eq!(m.body_bytes, 5);
    assert!(m.tls_handshake > Duration::ZERO);
    assert_eq!(m.total(), m.dns_lookup + m.tcp_handshake + m.tls_handshake + m.first_byte + m.last_byte);
    assert!(m.destination().starts_with("https://"));
}
