use crate::alert::{Alert, AlertId, AlertState};
use crate::error::AlertError;
use chrono::{DateTime, TimeDelta, Utc};
use drivemind_graph::Location;
use drivemind_telemetry::{EventKind, Severity, TelemetryEvent};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug)]
pub struct AlertConfig {
    /// Events below this severity never raise an alert.
    pub threshold: Severity,
    /// How long an alert stays active without being refreshed.
    pub ttl: Duration,
    /// Events this close to an alert's last refresh coalesce into it.
    pub coalesce_window: Duration,
    /// How many closed alerts are kept for review.
    pub history: NonZeroUsize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: Severity::Medium,
            ttl: Duration::from_secs(1800),
            coalesce_window: Duration::from_secs(300),
            history: NonZeroUsize::new(256).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// What happened to an observed event.
#[derive(Clone, Debug, PartialEq)]
pub enum Observation {
    BelowThreshold,
    Created(Alert),
    Refreshed(Alert),
}

type AlertKey = (Location, EventKind);

#[derive(Default)]
struct Alerts {
    active: BTreeMap<AlertId, Alert>,
    /// The newest active alert for each key.
    newest: HashMap<AlertKey, AlertId>,
    history: VecDeque<Alert>,
    next_id: u64,
}

impl Alerts {
    fn close(&mut self, id: AlertId, state: AlertState, at: DateTime<Utc>, history: usize) -> Option<Alert> {
        let mut alert = self.active.remove(&id)?;
        alert.close(state, at);
        let key = (alert.location, alert.kind);
        if self.newest.get(&key) == Some(&id) {
            self.newest.remove(&key);
        }
        if self.history.len() == history {
            self.history.pop_front();
        }
        self.history.push_back(alert.clone());
        Some(alert)
    }
}

pub struct AlertDispatcher {
    config: AlertConfig,
    ttl: TimeDelta,
    coalesce_window: TimeDelta,
    alerts: Mutex<Alerts>,
}

impl AlertDispatcher {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            ttl: TimeDelta::from_std(config.ttl).unwrap_or(TimeDelta::MAX),
            coalesce_window: TimeDelta::from_std(config.coalesce_window).unwrap_or(TimeDelta::MAX),
            config,
            alerts: Mutex::new(Alerts {
                next_id: 1,
                ..Alerts::default()
            }),
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Raises or refreshes an alert for an event.
    ///
    /// Alerts already past their TTL at `now` are expired first, so they are never refreshed.
    pub fn observe(&self, event: &TelemetryEvent, now: DateTime<Utc>) -> Observation {
        if event.severity < self.config.threshold {
            return Observation::BelowThreshold;
        }

        let mut alerts = self.lock();
        self.expire_locked(&mut alerts, now);

        let key = (event.location, event.kind);
        let coalesce_into = alerts.newest.get(&key).copied().filter(|id| {
            alerts.active.get(id).is_some_and(|alert| {
                (event.timestamp - alert.last_refreshed).abs() <= self.coalesce_window
            })
        });

        if let Some(alert) = coalesce_into.and_then(|id| alerts.active.get_mut(&id)) {
            alert.refresh(event, self.ttl);
            debug!(id = %alert.id, count = alert.event_count, "Refreshed alert");
            return Observation::Refreshed(alert.clone());
        }

        let id = AlertId::new(alerts.next_id);
        alerts.next_id += 1;
        let alert = Alert::open(id, event, self.ttl);
        alerts.newest.insert(key, id);
        alerts.active.insert(id, alert.clone());
        info!(%id, location = %alert.location, kind = %alert.kind, severity = %alert.severity, "Raised alert");
        Observation::Created(alert)
    }

    /// Expires every active alert whose TTL has fully elapsed at `now`.
    ///
    /// Returns the alerts that were expired.
    pub fn expire_due(&self, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = self.lock();
        self.expire_locked(&mut alerts, now)
    }

    fn expire_locked(&self, alerts: &mut Alerts, now: DateTime<Utc>) -> Vec<Alert> {
        let due: Vec<AlertId> = alerts
            .active
            .values()
            .filter(|alert| now >= alert.expires_at)
            .map(|alert| alert.id)
            .collect();
        let history = self.config.history.get();
        due.into_iter()
            .filter_map(|id| alerts.close(id, AlertState::Expired, now, history))
            .inspect(|alert| debug!(id = %alert.id, "Alert expired"))
            .collect()
    }

    /// Dismisses an active alert.
    ///
    /// Alerts past their TTL at `now` are expired first and can no longer be dismissed.
    ///
    /// # Errors
    ///
    /// - [`AlertError::NotFound`] if no alert with this id is known
    /// - [`AlertError::AlreadyClosed`] if the alert has already expired or been dismissed
    pub fn dismiss(&self, id: AlertId, now: DateTime<Utc>) -> Result<Alert, AlertError> {
        let mut alerts = self.lock();
        self.expire_locked(&mut alerts, now);
        if let Some(closed) = alerts.history.iter().find(|alert| alert.id == id) {
            return Err(AlertError::AlreadyClosed {
                id,
                state: closed.state,
            });
        }
        let history = self.config.history.get();
        let alert = alerts
            .close(id, AlertState::Dismissed, now, history)
            .ok_or(AlertError::NotFound(id))?;
        info!(%id, "Alert dismissed");
        Ok(alert)
    }

    /// Active alerts that have not yet reached their TTL at `now`,
    /// most severe first, then most recently refreshed.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<Alert> {
        let mut active: Vec<Alert> = self
            .lock()
            .active
            .values()
            .filter(|alert| now < alert.expires_at)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.last_refreshed.cmp(&a.last_refreshed))
        });
        active
    }

    /// Looks up an alert as of `now`, expiring it first if its TTL has elapsed.
    pub fn get(&self, id: AlertId, now: DateTime<Utc>) -> Option<Alert> {
        let mut alerts = self.lock();
        self.expire_locked(&mut alerts, now);
        alerts
            .active
            .get(&id)
            .or_else(|| alerts.history.iter().find(|alert| alert.id == id))
            .cloned()
    }

    /// Every known alert (active and retained history) as of `now`, newest first.
    pub fn all(&self, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = self.lock();
        self.expire_locked(&mut alerts, now);
        let mut all: Vec<Alert> = alerts
            .active
            .values()
            .chain(alerts.history.iter())
            .cloned()
            .collect();
        all.sort_by(|a, b| b.id.cmp(&a.id));
        all
    }

    /// Observes every event from the telemetry channel and expires stale alerts once a second.
    ///
    /// Returns once `shutdown` flips to `true` or its sender goes away,
    /// or when the telemetry channel closes.
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<TelemetryEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(threshold = %self.config.threshold, "Alert dispatcher started");

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        self.observe(&event, Utc::now());
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Alert dispatcher fell behind; some events were not observed");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = sweep.tick() => {
                    self.expire_due(Utc::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Alert dispatcher stopped");
    }

    fn lock(&self) -> MutexGuard<'_, Alerts> {
        self.alerts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
