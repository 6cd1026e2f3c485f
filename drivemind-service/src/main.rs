#![doc = include_str!("../README.md")]

use anyhow::Context;
use clap::Parser;
use drivemind_alerts::{AlertConfig, AlertDispatcher};
use drivemind_graph::{RoadGraphStore, RoadNetwork};
use drivemind_optimizer::{OptimizerConfig, RefreshInterval, RouteOptimizer};
use drivemind_routing::{PlannerConfig, RoutePlanner};
use drivemind_telemetry::{IngestConfig, Severity, TelemetryIngest};
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

mod api;
mod auth;
mod error;
mod extract;
mod state;

use state::AppState;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The address to listen on.
    #[arg(env, long, default_value = "0.0.0.0:8000")]
    listen_address: SocketAddr,

    /// Path to the road network JSON file.
    #[arg(env, long)]
    network: PathBuf,

    /// Bearer token required on API routes. Authentication is disabled when unset.
    #[arg(env, long)]
    api_token: Option<String>,

    /// Number of telemetry events to retain.
    #[arg(env, long, default_value = "1024")]
    event_capacity: NonZeroUsize,

    /// How often congestion weights are recomputed (5s, 15s, 30s, 1m, or 5m).
    #[arg(env, long, default_value = "15s")]
    refresh_interval: RefreshInterval,

    /// Only events from this many seconds back are used when recomputing weights.
    #[arg(env, long, default_value = "900")]
    optimizer_window_secs: u64,

    /// Seconds after which an event's influence on congestion has halved.
    #[arg(env, long, default_value = "300")]
    decay_half_life_secs: u64,

    /// Multiplier changes no larger than this are not written.
    #[arg(env, long, default_value = "0.01")]
    weight_epsilon: f64,

    /// Whether congestion weights are recomputed periodically.
    #[arg(env, long, default_value = "true", action = clap::ArgAction::Set)]
    optimizer_enabled: bool,

    /// Whether audio reports are accepted.
    #[arg(env, long, default_value = "true", action = clap::ArgAction::Set)]
    audio_detection: bool,

    /// Minimum event severity that raises an alert (low, medium, high, or critical).
    #[arg(env, long, default_value = "medium")]
    alert_threshold: Severity,

    /// Seconds an alert stays active without new reports.
    #[arg(env, long, default_value = "1800")]
    alert_ttl_secs: u64,

    /// Reports this many seconds apart or closer merge into the same alert.
    #[arg(env, long, default_value = "300")]
    alert_coalesce_secs: u64,

    /// Number of closed alerts kept for review.
    #[arg(env, long, default_value = "256")]
    alert_history: NonZeroUsize,

    /// Route searches taking longer than this many milliseconds are abandoned.
    #[arg(env, long, default_value = "2000")]
    plan_timeout_ms: u64,

    /// Maximum number of routes returned for a single plan request.
    #[arg(env, long, default_value = "3")]
    max_alternates: NonZeroUsize,
}

impl Cli {
    fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            capacity: self.event_capacity,
            ..IngestConfig::default()
        }
    }

    fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            enabled: self.optimizer_enabled,
            refresh_interval: self.refresh_interval,
            window: Duration::from_secs(self.optimizer_window_secs),
            half_life: Duration::from_secs(self.decay_half_life_secs),
            epsilon: self.weight_epsilon,
            ..OptimizerConfig::default()
        }
    }

    fn alert_config(&self) -> AlertConfig {
        AlertConfig {
            threshold: self.alert_threshold,
            ttl: Duration::from_secs(self.alert_ttl_secs),
            coalesce_window: Duration::from_secs(self.alert_coalesce_secs),
            history: self.alert_history,
        }
    }

    fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            timeout: Duration::from_millis(self.plan_timeout_ms),
            max_alternates: self.max_alternates,
            ..PlannerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        // Standard logger, configured via the RUST_LOG env variable
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .init();

    let network = RoadNetwork::from_json_file(&cli.network)
        .with_context(|| format!("Failed to load road network from {}", cli.network.display()))?;
    info!(
        path = %cli.network.display(),
        nodes = network.node_count(),
        segments = network.segment_count(),
        "Loaded road network"
    );

    let store = Arc::new(RoadGraphStore::new(network));
    let ingest = Arc::new(TelemetryIngest::new(Arc::clone(&store), cli.ingest_config()));
    let planner = Arc::new(RoutePlanner::new(Arc::clone(&store), cli.planner_config()));
    let optimizer = Arc::new(RouteOptimizer::new(
        Arc::clone(&store),
        Arc::clone(&ingest),
        cli.optimizer_config(),
    ));
    let alerts = Arc::new(AlertDispatcher::new(cli.alert_config()));

    if cli.api_token.is_none() {
        warn!("No API token configured; API routes are unauthenticated");
    }
    let state = AppState {
        store,
        ingest: Arc::clone(&ingest),
        planner,
        optimizer: Arc::clone(&optimizer),
        alerts: Arc::clone(&alerts),
        audio_detection: cli.audio_detection,
        api_token: cli.api_token.as_deref().map(Arc::from),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let background = [
        tokio::spawn(optimizer.run(ingest.subscribe(), shutdown_rx.clone())),
        tokio::spawn({
            let events = ingest.subscribe();
            let shutdown = shutdown_rx.clone();
            async move { alerts.run(events, shutdown).await }
        }),
    ];

    let listener = tokio::net::TcpListener::bind(cli.listen_address)
        .await
        .with_context(|| format!("Unable to listen on {}", cli.listen_address))?;
    info!("DriveMind service listening on {}", cli.listen_address);

    axum::serve(listener, api::create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Stop the background tasks and wait for them to wind down.
    shutdown_tx.send_replace(true);
    for task in background {
        if let Err(e) = task.await {
            warn!("Background task failed: {e}");
        }
    }
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Unable to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl-C received; shutting down..."),
        () = terminate => info!("SIGTERM received; shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_component_config() {
        let cli = Cli::try_parse_from([
            "drivemind-service",
            "--network",
            "fixtures/sample-network.json",
            "--refresh-interval",
            "1m",
            "--alert-threshold",
            "high",
            "--optimizer-enabled",
            "false",
            "--max-alternates",
            "2",
        ])
        .unwrap();

        let optimizer = cli.optimizer_config();
        assert!(!optimizer.enabled);
        assert_eq!(optimizer.refresh_interval, RefreshInterval::OneMinute);
        assert_eq!(optimizer.window, Duration::from_secs(900));
        assert_eq!(cli.alert_config().threshold, Severity::High);
        assert_eq!(cli.planner_config().max_alternates.get(), 2);
        assert_eq!(cli.ingest_config().capacity.get(), 1024);
        assert!(cli.audio_detection);
    }
}
