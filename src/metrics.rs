use prometheus::{Encoder, TextEncoder, GaugeVec, IntCounterVec, Opts, Registry};
use warp::Filter;
use std::net::SocketAddr;
use once_cell::sync::Lazy;

use crate::collect::{MetricRecord, METRIC_NAMES};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// One gauge family per stat, labelled by target hostname.
static STAT_GAUGES: Lazy<Vec<(&'static str, GaugeVec)>> = Lazy::new(|| {
    METRIC_NAMES
        .iter()
        .filter_map(|stat| {
            let opts = Opts::new(format!("ping_probe_{stat}"), stat_help(stat));
            let gauge = GaugeVec::new(opts, &["hostname"]).ok()?;
            REGISTRY.register(Box::new(gauge.clone())).ok()?;
            Some((*stat, gauge))
        })
        .collect()
});

static COLLECT_ERRORS: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
    let opts = Opts::new("ping_probe_collect_errors_total", "Collections that ended in a fatal error");
    let ctr = IntCounterVec::new(opts, &["hostname"]).ok()?;
    REGISTRY.register(Box::new(ctr.clone())).ok()?;
    Some(ctr)
});

fn stat_help(stat: &str) -> &'static str {
    match stat {
        "loss" => "Packet loss in percent",
        "avg" => "Average round-trip time in milliseconds",
        "min" => "Minimum round-trip time in milliseconds",
        "max" => "Maximum round-trip time in milliseconds",
        "median" => "Median round-trip time in milliseconds",
        _ => "Round-trip time standard deviation in milliseconds",
    }
}

pub async fn serve_metrics(addr: SocketAddr) {
    let metrics_route = warp::path!("metrics").map(move || {
        let encoder = TextEncoder::new();
        let mf = REGISTRY.gather();
        let mut buf = Vec::new();
        if let Err(e) = encoder.encode(&mf, &mut buf) {
            tracing::error!("failed to encode metrics: {}", e);
        }
        warp::reply::with_header(buf, "Content-Type", encoder.format_type())
    });

    warp::serve(metrics_route).run(addr).await;
}

/// Publish one collection. Stats missing from `records` are removed so a
/// stale latency is not left behind after the target stops answering.
pub fn publish(hostname: &str, records: &[MetricRecord]) {
    for (stat, gauge) in STAT_GAUGES.iter() {
        match records.iter().find(|r| r.stat() == *stat) {
            Some(record) => gauge.with_label_values(&[hostname]).set(record.value),
            None => {
                let _ = gauge.remove_label_values(&[hostname]);
            }
        }
    }
}

pub fn inc_collect_error(hostname: &str) {
    if let Some(ctr) = COLLECT_ERRORS.as_ref() {
        ctr.with_label_values(&[hostname]).inc();
    }
}
