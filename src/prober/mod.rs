use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{ProbeError, TransportError};

pub mod icmp;
pub mod session;

/// A validated probe request. Can only be built through [`ProbeRequest::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    host: String,
    count: u16,
    timeout: Duration,
}

impl ProbeRequest {
    pub fn new(host: impl Into<String>, count: u16, timeout: Duration) -> Result<Self, ProbeError> {
        let host = host.into();
        if host.is_empty() {
            return Err(ProbeError::config("hostname", "no host passed"));
        }
        if count == 0 {
            return Err(ProbeError::config("count", "must be greater than 0"));
        }
        if timeout.is_zero() {
            return Err(ProbeError::config("timeout", "must be greater than 0"));
        }
        Ok(Self { host, count, timeout })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// What the transport observed during one exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutcome {
    pub sent: u32,
    pub received: u32,
    /// One entry per received reply, in arrival order.
    pub latencies: Vec<Duration>,
}

impl RawOutcome {
    pub fn new(sent: u32, latencies: Vec<Duration>) -> Self {
        let received = latencies.len() as u32;
        debug_assert!(received <= sent, "received {received} > sent {sent}");
        Self {
            sent,
            received,
            latencies,
        }
    }
}

/// Hostname lookup boundary.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Returns every address the name resolves to; callers use the first.
    async fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// Echo exchange boundary. One implementation is shared by all sessions.
#[async_trait]
pub trait EchoTransport: Send + Sync {
    /// Send up to `count` echo requests to `addr` and wait for replies until
    /// they are all in or `deadline` passes.
    async fn exchange(
        &self,
        addr: IpAddr,
        count: u16,
        deadline: Instant,
    ) -> Result<RawOutcome, TransportError>;
}
