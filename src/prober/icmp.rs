use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::prober::{EchoTransport, RawOutcome};

/// Gap between consecutive echo requests of one exchange.
pub const SEND_INTERVAL: Duration = Duration::from_millis(100);

/// Process-wide ICMP coordinator.
///
/// Owns a single surge-ping client (one socket, one receive task). On a DGRAM
/// socket the kernel rewrites the echo identifier, so replies are matched by
/// (address, sequence) only. Every exchange therefore reserves its own block
/// of sequence numbers from a shared counter; concurrent sessions to the same
/// host never wait on the same sequence.
pub struct IcmpCoordinator {
    // Dropping any `Client` clone tears down the shared receive loop, so it
    // is only ever shared through this `Arc`.
    client: Arc<Client>,
    next_ident: AtomicU16,
    next_seq: AtomicU16,
}

enum EchoOutcome {
    Reply(Duration),
    Lost,
    Fatal(TransportError),
}

/// Reserve `n` consecutive values from `counter` and return the first one.
/// Values wrap around at `u16::MAX`.
fn reserve(counter: &AtomicU16, n: u16) -> u16 {
    counter.fetch_add(n, Ordering::Relaxed)
}

impl IcmpCoordinator {
    /// Open the ICMPv4 socket. Must be called from within the tokio runtime.
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::new(&Config::default())?;
        // Start from the pid so two probe processes on one host rarely collide.
        let seed = std::process::id() as u16;
        Ok(Self {
            client: Arc::new(client),
            next_ident: AtomicU16::new(seed),
            next_seq: AtomicU16::new(0),
        })
    }

    fn ident(&self) -> u16 {
        reserve(&self.next_ident, 1)
    }
}

async fn echo(client: Arc<Client>, addr: IpAddr, ident: u16, seq: u16, deadline: Instant) -> EchoOutcome {
    let mut pinger = client.pinger(addr, PingIdentifier(ident)).await;
    // surge-ping clears its reply slot only when its own timer fires, so the
    // deadline is enforced through it rather than by dropping the future.
    pinger.timeout(deadline.saturating_duration_since(Instant::now()));
    let payload = ident.to_be_bytes();

    match pinger.ping(PingSequence(seq), &payload).await {
        Ok((_packet, rtt)) => EchoOutcome::Reply(rtt),
        Err(SurgeError::Timeout { .. }) => EchoOutcome::Lost,
        Err(SurgeError::IOError(e)) => EchoOutcome::Fatal(TransportError::Io(e)),
        Err(SurgeError::ClientDestroyed) => {
            EchoOutcome::Fatal(TransportError::Other("icmp client destroyed".to_string()))
        }
        Err(e) => {
            warn!(%addr, seq, error = %e, "echo failed");
            EchoOutcome::Lost
        }
    }
}

#[async_trait]
impl EchoTransport for IcmpCoordinator {
    async fn exchange(
        &self,
        addr: IpAddr,
        count: u16,
        deadline: Instant,
    ) -> Result<RawOutcome, TransportError> {
        if !addr.is_ipv4() {
            return Err(TransportError::Other(format!("{addr} is not an IPv4 address")));
        }

        let ident = self.ident();
        let first_seq = reserve(&self.next_seq, count);
        let mut in_flight = JoinSet::new();
        let mut sent = 0u32;

        for i in 0..count {
            if Instant::now() >= deadline {
                break;
            }
            let seq = first_seq.wrapping_add(i);
            in_flight.spawn(echo(self.client.clone(), addr, ident, seq, deadline));
            sent += 1;
            if i + 1 < count {
                let next = Instant::now() + SEND_INTERVAL;
                sleep_until(next.min(deadline)).await;
            }
        }

        let mut latencies = Vec::with_capacity(sent as usize);
        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok(EchoOutcome::Reply(rtt)) => latencies.push(rtt),
                Ok(EchoOutcome::Lost) => {}
                Ok(EchoOutcome::Fatal(e)) => {
                    in_flight.abort_all();
                    return Err(e);
                }
                Err(e) => return Err(TransportError::Other(e.to_string())),
            }
        }

        debug!(%addr, ident, first_seq, sent, received = latencies.len(), "icmp exchange done");
        Ok(RawOutcome::new(sent, latencies))
    }
}
