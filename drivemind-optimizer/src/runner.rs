use crate::RefreshInterval;
use crate::optimizer::{RecomputeReport, RouteOptimizer};
use chrono::{DateTime, Utc};
use drivemind_telemetry::TelemetryEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerStatus {
    pub enabled: bool,
    pub refresh_interval: RefreshInterval,
    pub last_run: Option<DateTime<Utc>>,
    pub last_report: Option<RecomputeReport>,
    pub total_runs: u64,
    /// Events ingested since the last recomputation.
    pub pending_events: u64,
    pub generation: u64,
}

impl RouteOptimizer {
    pub fn status(&self) -> OptimizerStatus {
        let state = self.lock();
        OptimizerStatus {
            enabled: self.is_enabled(),
            refresh_interval: self.config.refresh_interval,
            last_run: state.last_report.as_ref().map(|report| report.ran_at),
            last_report: state.last_report.clone(),
            total_runs: state.total_runs,
            pending_events: self.pending.load(Ordering::Acquire),
            generation: self.store.generation(),
        }
    }

    /// Recomputes on every refresh tick while enabled, counting new events in between.
    ///
    /// Returns once `shutdown` flips to `true` or its sender goes away.
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<TelemetryEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let period = self.config.refresh_interval.duration();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut listening = true;
        info!(interval = %self.config.refresh_interval, enabled = self.is_enabled(), "Route optimizer started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.is_enabled() {
                        let optimizer = Arc::clone(&self);
                        let pass = tokio::task::spawn_blocking(move || optimizer.recompute(Utc::now()));
                        if let Err(e) = pass.await {
                            warn!("Scheduled recomputation failed: {e}");
                        }
                    }
                }
                received = events.recv(), if listening => match received {
                    Ok(_) => {
                        self.pending.fetch_add(1, Ordering::AcqRel);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Optimizer event counter lagged");
                        self.pending.fetch_add(skipped, Ordering::AcqRel);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Telemetry channel closed; pending event counts will stop updating");
                        listening = false;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Route optimizer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OptimizerConfig;
    use drivemind_graph::{Location, RoadGraphStore, RoadNetworkBuilder, RoadSegment, SegmentId};
    use drivemind_telemetry::{EventKind, IngestConfig, RawEvent, Severity, TelemetryIngest};
    use std::time::Duration;

    fn setup(config: OptimizerConfig) -> (Arc<RoadGraphStore>, Arc<TelemetryIngest<RoadGraphStore>>, Arc<RouteOptimizer>) {
        let network = RoadNetworkBuilder::new()
            .node(1, 12.97, 77.59)
            .node(2, 12.98, 77.60)
            .segment(RoadSegment::new(1, 1, 2, 1_000.0, 60.0))
            .build()
            .unwrap();
        let store = Arc::new(RoadGraphStore::new(network));
        let ingest = Arc::new(TelemetryIngest::new(Arc::clone(&store), IngestConfig::default()));
        let optimizer = Arc::new(RouteOptimizer::new(Arc::clone(&store), Arc::clone(&ingest), config));
        (store, ingest, optimizer)
    }

    fn closure() -> RawEvent {
        RawEvent::new(
            Location::Segment(SegmentId::new(1)),
            EventKind::Closure,
            Severity::High,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn recomputes_on_tick_and_stops_on_shutdown() {
        let (store, ingest, optimizer) = setup(OptimizerConfig {
            refresh_interval: RefreshInterval::FiveSeconds,
            ..OptimizerConfig::default()
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&optimizer).run(ingest.subscribe(), shutdown_rx));

        ingest.ingest(closure()).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let status = optimizer.status();
        assert!(status.total_runs >= 1);
        assert!(status.last_run.is_some());
        assert!(store.generation() >= 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_optimizer_only_counts_events() {
        let (store, ingest, optimizer) = setup(OptimizerConfig {
            enabled: false,
            refresh_interval: RefreshInterval::FiveSeconds,
            ..OptimizerConfig::default()
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&optimizer).run(ingest.subscribe(), shutdown_rx));

        tokio::task::yield_now().await;
        ingest.ingest(closure()).unwrap();
        ingest.ingest(closure()).unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;

        let status = optimizer.status();
        assert!(!status.enabled);
        assert_eq!(status.total_runs, 0);
        assert_eq!(status.pending_events, 2);
        assert_eq!(store.generation(), 0);

        drop(shutdown_tx);
        handle.await.unwrap();
    }
}
