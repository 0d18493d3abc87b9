// Host resolution through the system resolver.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::prober::Resolver;

/// Resolves through the OS (getaddrinfo via tokio). Only IPv4 addresses are
/// returned since the transport speaks ICMPv4.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        resolve_host_to_ips(host).await
    }
}

pub async fn resolve_host_to_ips(host: &str) -> std::io::Result<Vec<IpAddr>> {
    // First try to parse as IP address
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(if ip.is_ipv4() { vec![ip] } else { Vec::new() });
    }

    // If parsing fails, resolve via DNS
    let addr = format!("{}:0", host);
    let addrs = tokio::net::lookup_host(&addr).await?;
    let mut ips: Vec<IpAddr> = Vec::new();
    for ip in addrs.map(|a| a.ip()).filter(IpAddr::is_ipv4) {
        if !ips.contains(&ip) {
            ips.push(ip);
        }
    }
    Ok(ips)
}
