use chrono::{DateTime, Utc};
use drivemind_graph::Location;
use drivemind_telemetry::{EventId, EventKind, Severity, TelemetryEvent};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// How many contributing event ids an alert remembers.
pub(crate) const RECENT_EVENTS: usize = 5;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(u64);

impl AlertId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl Display for AlertId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "alert/{}", self.0)
    }
}

/// Lifecycle of an alert.
///
/// `Active` is the only state an alert can leave; the other two are terminal.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Active,
    Expired,
    Dismissed,
}

impl AlertState {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, AlertState::Active)
    }
}

impl Display for AlertState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AlertState::Active => "active",
            AlertState::Expired => "expired",
            AlertState::Dismissed => "dismissed",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub location: Location,
    pub kind: EventKind,
    /// The highest severity of any contributing event.
    pub severity: Severity,
    pub description: String,
    pub event_count: u64,
    /// The most recent contributing events, oldest first.
    pub recent_events: Vec<EventId>,
    pub first_seen: DateTime<Utc>,
    pub last_refreshed: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: AlertState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

fn expiry(from: DateTime<Utc>, ttl: chrono::Duration) -> DateTime<Utc> {
    from.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn describe(event: &TelemetryEvent) -> String {
    event.description.clone().unwrap_or_else(|| {
        format!(
            "{} {} reported at {} by {}",
            event.severity, event.kind, event.location, event.source
        )
    })
}

impl Alert {
    pub(crate) fn open(id: AlertId, event: &TelemetryEvent, ttl: chrono::Duration) -> Self {
        Self {
            id,
            location: event.location,
            kind: event.kind,
            severity: event.severity,
            description: describe(event),
            event_count: 1,
            recent_events: vec![event.id],
            first_seen: event.timestamp,
            last_refreshed: event.timestamp,
            expires_at: expiry(event.timestamp, ttl),
            state: AlertState::Active,
            closed_at: None,
        }
    }

    pub(crate) fn refresh(&mut self, event: &TelemetryEvent, ttl: chrono::Duration) {
        if event.severity >= self.severity {
            self.description = describe(event);
        }
        self.severity = self.severity.max(event.severity);
        self.event_count += 1;
        self.recent_events.push(event.id);
        if self.recent_events.len() > RECENT_EVENTS {
            self.recent_events.remove(0);
        }
        self.last_refreshed = self.last_refreshed.max(event.timestamp);
        self.expires_at = expiry(self.last_refreshed, ttl);
    }

    pub(crate) fn close(&mut self, state: AlertState, at: DateTime<Utc>) {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.closed_at = Some(at);
    }

    pub fn is_active(&self) -> bool {
        self.state == AlertState::Active
    }
}
