use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::prober::{EchoTransport, ProbeRequest, Resolver};
use crate::stats::{summarize, SummaryResult};

/// Runs probe requests against a shared resolver and transport.
///
/// Cheap to clone; the transport behind it is the process-wide coordinator.
#[derive(Clone)]
pub struct ProbeSession {
    resolver: Arc<dyn Resolver>,
    transport: Arc<dyn EchoTransport>,
}

impl ProbeSession {
    pub fn new(resolver: Arc<dyn Resolver>, transport: Arc<dyn EchoTransport>) -> Self {
        Self {
            resolver,
            transport,
        }
    }

    /// Probe `request.host()` once and summarize what came back.
    ///
    /// DNS failures and an expired deadline are reported as 100% loss. Only a
    /// transport failure is returned as an error.
    pub async fn run(&self, request: &ProbeRequest) -> Result<SummaryResult, ProbeError> {
        let deadline = Instant::now() + request.timeout();
        let host = request.host();

        let addr = match self.resolver.resolve(host).await {
            Ok(addrs) => match addrs.first() {
                Some(addr) => *addr,
                None => {
                    warn!(host, "hostname resolved to no addresses");
                    return Ok(SummaryResult::total_loss());
                }
            },
            Err(e) => {
                warn!(host, error = %e, "failed to resolve hostname");
                return Ok(SummaryResult::total_loss());
            }
        };
        debug!(host, %addr, "resolved");

        if Instant::now() >= deadline {
            warn!(host, timeout_ms = request.timeout().as_millis() as u64, "deadline passed while resolving");
            return Ok(SummaryResult::total_loss());
        }

        let outcome = self
            .transport
            .exchange(addr, request.count(), deadline)
            .await?;
        debug!(
            host,
            %addr,
            sent = outcome.sent,
            received = outcome.received,
            "exchange complete"
        );

        Ok(summarize(&outcome))
    }
}
