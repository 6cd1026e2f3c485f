use crate::config::OptimizerConfig;
use chrono::{DateTime, Utc};
use drivemind_graph::{Location, RoadGraphStore, SegmentId, WeightChange};
use drivemind_telemetry::{EventKind, Severity, TelemetryEvent, TelemetryIngest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What a single recomputation did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeReport {
    pub ran_at: DateTime<Utc>,
    pub events_considered: usize,
    /// Events that could not be applied (e.g. timestamped in the future).
    pub events_skipped: usize,
    /// Segments whose target multiplier is above free flow.
    pub segments_congested: usize,
    pub segments_updated: usize,
    /// Segments left alone because an operator pinned their multiplier.
    pub segments_pinned: usize,
    pub segments_failed: usize,
    pub generation: u64,
    pub elapsed_ms: u64,
}

#[derive(Default)]
pub(crate) struct RunState {
    pub(crate) last_report: Option<RecomputeReport>,
    pub(crate) total_runs: u64,
}

pub struct RouteOptimizer {
    pub(crate) store: Arc<RoadGraphStore>,
    ingest: Arc<TelemetryIngest<RoadGraphStore>>,
    pub(crate) config: OptimizerConfig,
    pub(crate) enabled: AtomicBool,
    pub(crate) pending: AtomicU64,
    /// Held for the duration of a recomputation, so passes never interleave their writes.
    pass: Mutex<()>,
    state: Mutex<RunState>,
}

const fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Low => 0.25,
        Severity::Medium => 0.5,
        Severity::High => 1.0,
        Severity::Critical => 2.0,
    }
}

const fn kind_weight(kind: EventKind) -> f64 {
    match kind {
        EventKind::Congestion => 1.0,
        EventKind::Accident => 1.5,
        EventKind::Weather => 0.5,
        EventKind::Closure => 4.0,
    }
}

/// The decayed contribution of an event at time `now`.
///
/// Returns `None` for events from the future or when the weight is not a finite number.
pub fn event_weight(event: &TelemetryEvent, now: DateTime<Utc>, half_life: Duration) -> Option<f64> {
    let age = (now - event.timestamp).to_std().ok()?;
    let half_life = half_life.as_secs_f64().max(f64::MIN_POSITIVE);
    let decay = (-std::f64::consts::LN_2 * age.as_secs_f64() / half_life).exp();
    let weight = severity_weight(event.severity) * kind_weight(event.kind) * decay;
    weight.is_finite().then_some(weight)
}

impl RouteOptimizer {
    pub fn new(
        store: Arc<RoadGraphStore>,
        ingest: Arc<TelemetryIngest<RoadGraphStore>>,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            store,
            ingest,
            enabled: AtomicBool::new(config.enabled),
            config,
            pending: AtomicU64::new(0),
            pass: Mutex::new(()),
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        info!(enabled, "Route optimizer toggled");
    }

    /// Re-derives every segment's congestion multiplier from the events in the window ending at `now`.
    ///
    /// Segments with no recent events decay back to free flow.
    /// Segments pinned by an operator keep their multiplier.
    /// Bad events and failed segment updates are logged and counted, never fatal.
    /// Concurrent calls run one at a time.
    pub fn recompute(&self, now: DateTime<Utc>) -> RecomputeReport {
        let _pass = self
            .pass
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let started = Instant::now();
        let window = chrono::Duration::from_std(self.config.window).unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let events = self.ingest.events_since(cutoff);
        self.pending.store(0, Ordering::Release);

        let network = self.store.network();
        let mut contributions: HashMap<SegmentId, f64> = HashMap::new();
        let mut events_skipped = 0;
        for event in &events {
            let Some(weight) = event_weight(event, now, self.config.half_life) else {
                warn!(id = %event.id, timestamp = %event.timestamp, "Skipping event that cannot be weighted");
                events_skipped += 1;
                continue;
            };
            match event.location {
                Location::Segment(id) if network.contains_segment(id) => {
                    *contributions.entry(id).or_default() += weight;
                }
                Location::Node(id) if network.contains_node(id) => {
                    for segment in network.segments_at(id) {
                        *contributions.entry(segment.id).or_default() +=
                            weight * self.config.near_factor;
                    }
                }
                location => {
                    warn!(id = %event.id, %location, "Skipping event at an unknown location");
                    events_skipped += 1;
                }
            }
        }

        let mut segments_updated = 0;
        let mut segments_pinned = 0;
        let mut segments_failed = 0;
        for segment in network.segments() {
            let target = contributions.get(&segment.id).map_or(1.0, |sum| {
                (1.0 + self.config.gain * sum).min(self.config.max_multiplier)
            });
            match self
                .store
                .apply_weight_update_if_changed(segment.id, target, self.config.epsilon, now)
            {
                Ok(WeightChange::Applied) => segments_updated += 1,
                Ok(WeightChange::Pinned) => segments_pinned += 1,
                Ok(WeightChange::Unchanged) => {}
                Err(e) => {
                    warn!(segment = %segment.id, "Failed to update weight: {e}");
                    segments_failed += 1;
                }
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let report = RecomputeReport {
            ran_at: now,
            events_considered: events.len(),
            events_skipped,
            segments_congested: contributions.len(),
            segments_updated,
            segments_pinned,
            segments_failed,
            generation: self.store.generation(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        debug!(
            events = report.events_considered,
            updated = report.segments_updated,
            generation = report.generation,
            "Recomputed congestion weights"
        );

        let mut state = self.lock();
        state.total_runs += 1;
        state.last_report = Some(report.clone());
        report
    }

    /// Recomputes immediately if the optimizer is enabled, then reports status.
    pub fn trigger(&self, now: DateTime<Utc>) -> crate::OptimizerStatus {
        if self.is_enabled() {
            self.recompute(now);
        } else {
            debug!("Ignoring manual trigger; the optimizer is disabled");
        }
        self.status()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
