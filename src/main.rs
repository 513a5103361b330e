//! Traffic router daemon.
//!
//! Loads a TOML configuration, registers the static instances with a load
//! balancer, runs active health checks and logs balancer stats until a
//! shutdown signal arrives.
//!
//! ```text
//!   config.toml ──▶ loader ──▶ LoadBalancer ◀──── HealthChecker (periodic probes)
//!                                   │
//!                                   └──▶ stats loop ──▶ tracing (JSON stats)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use clap::Parser;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use traffic_router::config::{load_config, RouterConfig};
use traffic_router::lifecycle::{signals, Shutdown};
use traffic_router::observability::{logging, metrics};
use traffic_router::{LoadBalancer, RouterError, RouterResult};

#[derive(Parser)]
#[command(name = "traffic-router")]
#[command(about = "Load balancer with circuit breaking and active health checks", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> RouterResult<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };

    logging::init_logging(cli.log_level.as_deref().unwrap_or(&config.observability.log_level));
    tracing::info!("traffic-router v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        algorithm = %config.balancer.algorithm,
        instances = config.instances.len(),
        health_interval_ms = config.balancer.health_check.interval_ms,
        failure_threshold = config.balancer.circuit_breaker.failure_threshold,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let address = &config.observability.metrics_address;
        let addr = address.parse::<SocketAddr>().map_err(|source| RouterError::MetricsAddress {
            address: address.clone(),
            source,
        })?;
        metrics::init_metrics(addr);
    }

    let balancer = LoadBalancer::new(config.balancer.clone());
    for spec in config.instances.iter().cloned() {
        balancer.add_instance(spec);
    }

    let health = if config.balancer.health_check.enabled {
        Some(balancer.start_health_checks())
    } else {
        tracing::info!("Active health checks disabled");
        None
    };

    let shutdown = Shutdown::new();
    let stats = tokio::spawn(log_stats(
        balancer.clone(),
        Duration::from_millis(config.stats_interval_ms),
        shutdown.subscribe(),
    ));

    signals::wait_for_signal().await;
    tracing::info!("Shutting down");

    shutdown.trigger();
    if let Some(health) = health {
        health.stop().await;
    }
    let _ = stats.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn log_stats(balancer: LoadBalancer, every: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick is immediate; skip it so stats reflect at least one probe.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stats = balancer.get_stats();
                match serde_json::to_string(&stats) {
                    Ok(json) => tracing::info!(
                        healthy = stats.healthy_instances,
                        total = stats.total_instances,
                        stats = %json,
                        "Balancer stats"
                    ),
                    Err(e) => tracing::error!(error = %e, "Failed to serialize stats"),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
