//! DNS resolution for the instrumented fetch

use crate::{
    error::{AppError, Result},
    types::TargetHost,
};
use std::net::IpAddr;
use trust_dns_resolver::{
    config::{ResolverConfig, ResolverOpts},
    system_conf, TokioAsyncResolver,
};

/// Asynchronous resolver that never answers from a cache.
///
/// Every attempt pays for and measures its own lookup, so results are
/// comparable from one iteration to the next.
#[derive(Clone)]
pub struct Resolver {
    inner: TokioAsyncResolver,
}

impl Resolver {
    /// Build from the system configuration, falling back to the library defaults
    pub fn from_system() -> Self {
        let (config, mut opts) = system_conf::read_system_conf()
            .unwrap_or_else(|_| (ResolverConfig::default(), ResolverOpts::default()));
        opts.cache_size = 0;
        Self {
            inner: TokioAsyncResolver::tokio(config, opts),
        }
    }

    /// Build with explicit settings; the cache is always disabled
    pub fn with_config(config: ResolverConfig, mut opts: ResolverOpts) -> Self {
        opts.cache_size = 0;
        Self {
            inner: TokioAsyncResolver::tokio(config, opts),
        }
    }

    /// Resolve `host` to one address.
    ///
    /// IP literals are returned as is. For names the first answer is used.
    pub async fn resolve(&self, host: &TargetHost) -> Result<IpAddr> {
        match host {
            TargetHost::Ip(ip) => Ok(*ip),
            TargetHost::Domain(name) => {
                let lookup = self.inner.lookup_ip(name.as_str()).await?;
                lookup.iter().next().ok_or_else(|| {
                    AppError::dns_resolution(format!("No addresses found for {}", name))
                })
            }
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ip_literal_skips_lookup() {
        let resolver = Resolver::from_system();
        let ip: IpAddr = "192.0.2.7".parse().unwrap();
        assert_eq!(resolver.resolve(&TargetHost::Ip(ip)).await.unwrap(), ip);
    }

    #[tokio::test]
    async fn test_localhost_resolves_from_hosts_file() {
        let resolver = Resolver::from_system();
        let ip = resolver
            .resolve(&TargetHost::Domain("localhost".to_string()))
            .await
            .unwrap();
        assert!(ip.is_loopback());
    }
}
