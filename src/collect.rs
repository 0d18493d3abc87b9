//! Collector boundary: what the host framework asks for and what it gets back.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PingConfig;
use crate::error::ProbeError;
use crate::prober::session::ProbeSession;
use crate::stats::SummaryResult;

pub const PLUGIN_NAME: &str = "ping";
pub const PLUGIN_VERSION: i32 = 1;
pub const PLUGIN_TYPE: &str = "collector";
/// How many collections the host may run against one process at once.
pub const CONCURRENCY_COUNT: usize = 5000;

/// Fixed namespace root every metric lives under.
pub const NAMESPACE_ROOT: [&str; 2] = ["raintank", "ping"];

pub const METRIC_NAMES: [&str; 6] = ["avg", "min", "max", "median", "mdev", "loss"];

/// A metric the caller wants, as named by the host framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricType {
    pub namespace: Vec<String>,
    #[serde(default)]
    pub version: i32,
}

impl MetricType {
    pub fn new(stat: &str, version: i32) -> Self {
        Self {
            namespace: namespace(stat),
            version,
        }
    }

    /// The stat name if this type lives under `raintank/ping`.
    pub fn stat(&self) -> Option<&str> {
        match self.namespace.as_slice() {
            [root, plugin, stat] if *root == NAMESPACE_ROOT[0] && *plugin == NAMESPACE_ROOT[1] => {
                Some(stat.as_str())
            }
            _ => None,
        }
    }
}

/// One emitted value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub namespace: Vec<String>,
    pub value: f64,
    pub timestamp: SystemTime,
    pub version: i32,
}

impl MetricRecord {
    pub fn stat(&self) -> &str {
        self.namespace.last().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfigRule {
    pub name: &'static str,
    pub kind: &'static str,
    pub required: bool,
    pub default: Option<f64>,
}

fn namespace(stat: &str) -> Vec<String> {
    NAMESPACE_ROOT
        .iter()
        .copied()
        .chain(std::iter::once(stat))
        .map(str::to_string)
        .collect()
}

/// Every metric this collector can produce.
pub fn metric_types() -> Vec<MetricType> {
    METRIC_NAMES.iter().map(|name| MetricType::new(name, 0)).collect()
}

/// Config keys understood under `raintank/ping`.
pub fn config_policy() -> Vec<ConfigRule> {
    vec![
        ConfigRule {
            name: "hostname",
            kind: "string",
            required: true,
            default: None,
        },
        ConfigRule {
            name: "timeout",
            kind: "float",
            required: false,
            default: Some(crate::config::DEFAULT_TIMEOUT_SECS),
        },
        ConfigRule {
            name: "count",
            kind: "integer",
            required: false,
            default: Some(crate::config::DEFAULT_COUNT as f64),
        },
    ]
}

/// Keep the requested metrics that have a value, in request order.
pub fn select_metrics(
    summary: &SummaryResult,
    requested: &[MetricType],
    timestamp: SystemTime,
) -> Vec<MetricRecord> {
    requested
        .iter()
        .filter_map(|mt| {
            let stat = mt.stat()?;
            let value = summary.get(stat)?;
            Some(MetricRecord {
                namespace: namespace(stat),
                value,
                timestamp,
                version: mt.version,
            })
        })
        .collect()
}

/// Validate `config`, run one probe session and return the requested metrics.
pub async fn collect_metrics(
    session: &ProbeSession,
    config: &PingConfig,
    requested: &[MetricType],
) -> Result<Vec<MetricRecord>, ProbeError> {
    let request = config.to_request()?;
    let run_time = SystemTime::now();
    let summary = session.run(&request).await?;
    info!(
        host = request.host(),
        loss = summary.loss,
        avg = ?summary.avg,
        "ping collected"
    );
    Ok(select_metrics(&summary, requested, run_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::session::tests::{StubResolver, StubTransport};
    use crate::prober::RawOutcome;
    use crate::stats::summarize;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    fn all_requested(version: i32) -> Vec<MetricType> {
        METRIC_NAMES.iter().map(|n| MetricType::new(n, version)).collect()
    }

    #[test]
    fn catalogue_has_six_metrics() {
        let types = metric_types();
        assert_eq!(types.len(), 6);
        for mt in &types {
            assert_eq!(&mt.namespace[..2], &["raintank", "ping"]);
            assert!(METRIC_NAMES.contains(&mt.stat().unwrap()));
        }
    }

    #[test]
    fn policy_lists_known_keys() {
        let policy = config_policy();
        assert_eq!(policy.len(), 3);
        let hostname = policy.iter().find(|r| r.name == "hostname").unwrap();
        assert!(hostname.required);
        assert_eq!(hostname.kind, "string");
        assert!(policy.iter().filter(|r| r.name != "hostname").all(|r| !r.required));
    }

    #[test]
    fn policy_defaults() {
        let policy = config_policy();
        let timeout = policy.iter().find(|r| r.name == "timeout").unwrap();
        let count = policy.iter().find(|r| r.name == "count").unwrap();
        assert_eq!(timeout.default, Some(10.0));
        assert_eq!(count.default, Some(5.0));
        assert_eq!(
            *count,
            ConfigRule {
                name: "count",
                kind: "integer",
                required: false,
                default: Some(5.0),
            }
        );
    }

    #[test]
    fn stat_requires_ping_namespace() {
        let foreign = MetricType {
            namespace: vec!["intel".into(), "ping".into(), "avg".into()],
            version: 1,
        };
        assert_eq!(foreign.stat(), None);
        assert_eq!(MetricType::new("avg", 1).stat(), Some("avg"));
    }

    #[test]
    fn absent_metrics_are_dropped() {
        let summary = SummaryResult::total_loss();
        let now = SystemTime::now();
        let records = select_metrics(&summary, &all_requested(3), now);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stat(), "loss");
        assert_eq!(records[0].value, 100.0);
        assert_eq!(records[0].version, 3);
    }

    #[test]
    fn unrequested_metrics_are_dropped() {
        let summary = summarize(&RawOutcome::new(2, vec![Duration::from_millis(5); 2]));
        let now = SystemTime::now();
        let requested = vec![MetricType::new("max", 7), MetricType::new("loss", 2)];
        let records = select_metrics(&summary, &requested, now);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].stat(), "max");
        assert_eq!(records[0].version, 7);
        assert_eq!(records[1].stat(), "loss");
        assert_eq!(records[1].version, 2);
        assert!(records.iter().all(|r| r.timestamp == now));
    }

    #[tokio::test]
    async fn collects_all_metrics() {
        let resolver = Arc::new(StubResolver::ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]));
        let transport = Arc::new(StubTransport::replying(vec![10, 20, 30, 40, 50]));
        let session = ProbeSession::new(resolver, transport);
        let config = PingConfig::new("127.0.0.1");

        let records = collect_metrics(&session, &config, &all_requested(1)).await.unwrap();

        assert_eq!(records.len(), 6);
        let ts = records[0].timestamp;
        assert!(records.iter().all(|r| r.timestamp == ts && r.version == 1));
        let median = records.iter().find(|r| r.stat() == "median").unwrap();
        assert_eq!(median.value, 30.0);
    }

    #[tokio::test]
    async fn empty_hostname_never_probes() {
        let resolver = Arc::new(StubResolver::ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]));
        let transport = Arc::new(StubTransport::replying(vec![1]));
        let session = ProbeSession::new(resolver.clone(), transport.clone());
        let config = PingConfig::new("");

        let err = collect_metrics(&session, &config, &all_requested(1))
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("hostname"));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unresolvable_host_reports_loss_only() {
        let resolver = Arc::new(StubResolver::failing());
        let transport = Arc::new(StubTransport::replying(vec![1]));
        let session = ProbeSession::new(resolver, transport.clone());
        let config = PingConfig::new("does-not-exist.invalid");

        let records = collect_metrics(&session, &config, &all_requested(1)).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stat(), "loss");
        assert_eq!(records[0].value, 100.0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
