//! Mirror resolution for the load-balanced directory DNS name.
//!
//! The directory service publishes a round-robin name (`all.<domain>`).
//! Resolving it once and reverse-resolving the winning address pins a fetch
//! to one concrete, geographically routed mirror, so keep-alive connections
//! within a fetch all talk to the same host.  Every failure here is
//! non-fatal: callers degrade to a hardcoded known-good mirror.

use std::net::IpAddr;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, warn};

pub struct HostResolver {
    resolver: TokioAsyncResolver,
}

impl HostResolver {
    /// Build a resolver from the system DNS configuration, falling back to
    /// the library defaults when no usable config exists.
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            warn!("system DNS config unavailable ({}), using defaults", e);
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }

    /// Forward-resolve `hostname` to a numeric address.  The first address
    /// the resolver returns wins; the upstream service documents no
    /// weighting, so this is best-effort selection only.
    pub async fn resolve_mirror(&self, hostname: &str) -> Option<IpAddr> {
        match self.resolver.lookup_ip(hostname).await {
            Ok(lookup) => {
                let addr = lookup.iter().next();
                debug!("resolved {} -> {:?}", hostname, addr);
                addr
            }
            Err(e) => {
                warn!("forward lookup of {} failed: {}", hostname, e);
                None
            }
        }
    }

    /// Reverse-resolve `addr` to a hostname.  On failure the textual address
    /// is returned unchanged, matching the forward contract: resolution
    /// problems never propagate as errors.
    pub async fn reverse_lookup(&self, addr: IpAddr) -> String {
        match self.resolver.reverse_lookup(addr).await {
            Ok(names) => match names.iter().next() {
                Some(ptr) => ptr.0.to_utf8().trim_end_matches('.').to_string(),
                None => {
                    warn!("reverse lookup of {} returned no names", addr);
                    addr.to_string()
                }
            },
            Err(e) => {
                warn!("reverse lookup of {} failed: {}", addr, e);
                addr.to_string()
            }
        }
    }

    /// Resolve the round-robin name to a concrete mirror hostname.
    /// `None` means the caller should use its default mirror.
    pub async fn mirror_hostname(&self, lookup_host: &str) -> Option<String> {
        let addr = self.resolve_mirror(lookup_host).await?;
        Some(self.reverse_lookup(addr).await)
    }
}

impl Default for HostResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Live-DNS checks; run explicitly with --ignored when online.
    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_mirror_resolution_roundtrip() {
        let resolver = HostResolver::new();
        let mirror = resolver
            .mirror_hostname("all.api.radio-browser.info")
            .await
            .expect("no address for round-robin name");
        assert!(!mirror.is_empty());
        assert!(!mirror.ends_with('.'));
    }

    #[tokio::test]
    async fn test_reverse_lookup_of_unmapped_addr_returns_input() {
        let resolver = HostResolver::new();
        // TEST-NET-1 has no PTR records; expect the textual address back.
        let out = resolver.reverse_lookup("192.0.2.1".parse().unwrap()).await;
        assert_eq!(out, "192.0.2.1");
    }
}
