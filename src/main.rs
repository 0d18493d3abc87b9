mod collect;
mod config;
mod error;
mod metrics;
mod prober;
mod scheduler;
mod stats;
mod util;

use config::ConfigManager;
use scheduler::Scheduler;
use metrics::{inc_collect_error, publish};
use prober::icmp::IcmpCoordinator;
use prober::session::ProbeSession;
use util::SystemResolver;

use std::sync::Arc;
use tracing::{debug, info, error};

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    // Load config first to get log level
    let config_mgr = Arc::new(ConfigManager::start().await?);
    let (log_level, probe_interval_ms, metrics_port) = {
        let config = config_mgr.config.read().await;
        (config.get_tracing_level()?, config.probe_interval_ms, config.metrics_port)
    };

    // Init tracing with configured log level. Logs go to stderr so one-shot
    // output on stdout stays machine readable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
                         .add_directive(format!("ping_probe={}", log_level.as_str().to_lowercase()).parse()?))
        .init();

    info!(
        plugin = collect::PLUGIN_NAME,
        version = collect::PLUGIN_VERSION,
        kind = collect::PLUGIN_TYPE,
        max_concurrency = collect::CONCURRENCY_COUNT,
        "starting ping probe"
    );
    debug!(metrics = ?collect::metric_types(), policy = ?collect::config_policy(), "collector catalogue");

    // One ICMP coordinator for the whole process, shared by every session.
    let transport = Arc::new(IcmpCoordinator::new()?);
    let session = ProbeSession::new(Arc::new(SystemResolver), transport);

    if probe_interval_ms == 0 {
        let config = config_mgr.config.read().await.clone();
        let records = collect::collect_metrics(&session, &config.ping, &config.requested_metrics()).await?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    // Start metrics endpoint
    let metrics_addr = ([0, 0, 0, 0], metrics_port).into();
    tokio::spawn(metrics::serve_metrics(metrics_addr));
    info!(port = metrics_port, interval_ms = probe_interval_ms, "serving /metrics");

    let scheduler = Scheduler::new(probe_interval_ms)?;

    scheduler.run(move || {
        let config_mgr = config_mgr.clone();
        let session = session.clone();
        async move {
            let config = config_mgr.config.read().await.clone();
            let hostname = config.ping.hostname.clone().unwrap_or_default();
            match collect::collect_metrics(&session, &config.ping, &config.requested_metrics()).await {
                Ok(records) => publish(&hostname, &records),
                Err(e) => {
                    error!(host = %hostname, field = ?e.field(), error = %e, "ping collection failed");
                    inc_collect_error(&hostname);
                }
            }
        }
    }).await?;

    Ok(())
}
