//! Type definitions shared across the probe

use std::net::IpAddr;
use serde::{Deserialize, Serialize};
use url::{Host, Url};

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Output format for per-measurement records on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// Tab separated millisecond values with a header line
    #[default]
    Text,
    /// Pretty-printed JSON records with nanosecond values
    Json,
}

/// Supported URL schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Host part of a target, split the way the resolver needs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetHost {
    /// A name that has to go through DNS
    Domain(String),
    /// A literal address, DNS is skipped
    Ip(IpAddr),
}

/// One destination URL under repeated measurement
///
/// Parsed once at startup and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
    scheme: Scheme,
    host: TargetHost,
    port: u16,
}

impl Target {
    /// Parse a target URL. A missing scheme defaults to `https://`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::validation("Target URL cannot be empty"));
        }

        let url = if raw.contains("://") {
            Url::parse(raw)?
        } else {
            Url::parse(&format!("https://{}", raw))?
        };

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(AppError::validation(format!(
                    "Unsupported URL scheme '{}' in {}",
                    other, raw
                )))
            }
        };

        let host = match url.host() {
            Some(Host::Domain(name)) => TargetHost::Domain(name.to_string()),
            Some(Host::Ipv4(ip)) => TargetHost::Ip(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => TargetHost::Ip(IpAddr::V6(ip)),
            None => return Err(AppError::validation(format!("URL must have a host: {}", raw))),
        };

        let port = url
            .port_or_known_default()
            .ok_or_else(|| AppError::validation(format!("Cannot determine port for {}", raw)))?;

        Ok(Self { url, scheme, host, port })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Whether the exchange includes a TLS handshake phase
    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::Https
    }

    pub fn host(&self) -> &TargetHost {
        &self.host
    }

    /// Host as written in the URL (IPv6 literals keep their brackets)
    pub fn host_str(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Value for the `Host` request header
    pub fn authority(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.host_str(), port),
            None => self.host_str().to_string(),
        }
    }

    /// Normalized destination: scheme, authority and path, no query or fragment
    pub fn destination(&self) -> String {
        format!("{}://{}{}", self.scheme.as_str(), self.authority(), self.url.path())
    }

    /// Origin-form request target sent on the wire (path plus query)
    pub fn request_target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.destination())
    }
}
