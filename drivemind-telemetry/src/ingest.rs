use crate::error::IngestError;
use crate::event::{EventId, RawEvent, TelemetryEvent};
use chrono::{DateTime, Utc};
use drivemind_graph::{Location, RoadGraphStore, RoadNetwork};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

const UNKNOWN_SOURCE: &str = "unknown";

/// Answers whether a telemetry location exists in the road network.
pub trait LocationResolver: Send + Sync {
    fn resolves(&self, location: Location) -> bool;
}

impl LocationResolver for RoadNetwork {
    fn resolves(&self, location: Location) -> bool {
        RoadNetwork::resolves(self, location)
    }
}

impl LocationResolver for RoadGraphStore {
    fn resolves(&self, location: Location) -> bool {
        RoadGraphStore::resolves(self, location)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct IngestConfig {
    /// Maximum number of events retained; the oldest are evicted first.
    pub capacity: NonZeroUsize,
    /// How many published events a slow subscriber may fall behind by.
    pub channel_capacity: NonZeroUsize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            capacity: NonZeroUsize::new(1024).unwrap_or(NonZeroUsize::MIN),
            channel_capacity: NonZeroUsize::new(256).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

struct EventBuffer {
    events: VecDeque<TelemetryEvent>,
    capacity: usize,
    next_id: u64,
    evicted: u64,
}

/// Validates incoming events, keeps a bounded window of recent history,
/// and publishes every accepted event to subscribers.
///
/// Events in the buffer are ordered by id, and timestamps never decrease
/// in id order, so time-window queries can binary search.
pub struct TelemetryIngest<R> {
    resolver: Arc<R>,
    buffer: Mutex<EventBuffer>,
    publisher: broadcast::Sender<TelemetryEvent>,
}

impl<R: LocationResolver> TelemetryIngest<R> {
    pub fn new(resolver: Arc<R>, config: IngestConfig) -> Self {
        let (publisher, _) = broadcast::channel(config.channel_capacity.get());
        Self {
            resolver,
            buffer: Mutex::new(EventBuffer {
                events: VecDeque::with_capacity(config.capacity.get()),
                capacity: config.capacity.get(),
                next_id: 1,
                evicted: 0,
            }),
            publisher,
        }
    }

    /// Validates and records an event, stamping it with the current time.
    ///
    /// # Errors
    ///
    /// - [`IngestError::UnknownLocation`] if the location is not in the network
    /// - [`IngestError::InvalidConfidence`] if a confidence outside `[0, 1]` is given
    pub fn ingest(&self, raw: RawEvent) -> Result<TelemetryEvent, IngestError> {
        self.ingest_at(raw, Utc::now())
    }

    /// Like [`TelemetryIngest::ingest`], with an explicit ingest time.
    ///
    /// # Errors
    ///
    /// See [`TelemetryIngest::ingest`].
    pub fn ingest_at(
        &self,
        raw: RawEvent,
        now: DateTime<Utc>,
    ) -> Result<TelemetryEvent, IngestError> {
        if !self.resolver.resolves(raw.location) {
            return Err(IngestError::UnknownLocation(raw.location));
        }
        if let Some(confidence) = raw.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(IngestError::InvalidConfidence(confidence));
            }
        }

        let event = {
            let mut buffer = self.lock();
            // Keep timestamps non-decreasing even if the wall clock steps backwards.
            let timestamp = buffer
                .events
                .back()
                .map_or(now, |last| last.timestamp.max(now));
            let event = TelemetryEvent {
                id: EventId::new(buffer.next_id),
                location: raw.location,
                kind: raw.kind,
                severity: raw.severity,
                timestamp,
                source: raw.source.unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
                description: raw.description,
                confidence: raw.confidence,
            };
            buffer.next_id += 1;
            if buffer.events.len() == buffer.capacity {
                buffer.events.pop_front();
                buffer.evicted += 1;
            }
            buffer.events.push_back(event.clone());
            event
        };

        debug!(id = %event.id, location = %event.location, kind = %event.kind, severity = %event.severity, "Ingested event");
        if self.publisher.send(event.clone()).is_err() {
            trace!("No subscribers for telemetry events");
        }
        Ok(event)
    }

    /// Ingests each event independently.
    ///
    /// One invalid event does not prevent the others from being recorded;
    /// the result at each position corresponds to the input at that position.
    pub fn ingest_batch(
        &self,
        raws: impl IntoIterator<Item = RawEvent>,
    ) -> Vec<Result<TelemetryEvent, IngestError>> {
        raws.into_iter()
            .enumerate()
            .map(|(position, raw)| {
                self.ingest(raw).inspect_err(|e| {
                    warn!(position, "Rejected event in batch: {e}");
                })
            })
            .collect()
    }

    /// All retained events with a timestamp at or after `since`, oldest first.
    pub fn events_since(&self, since: DateTime<Utc>) -> Vec<TelemetryEvent> {
        let buffer = self.lock();
        let start = buffer.events.partition_point(|event| event.timestamp < since);
        buffer.events.range(start..).cloned().collect()
    }

    /// Up to `limit` of the most recent events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<TelemetryEvent> {
        self.lock().events.iter().rev().take(limit).cloned().collect()
    }

    /// Subscribes to events accepted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.publisher.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// How many events have been dropped from the buffer to make room.
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    fn lock(&self) -> MutexGuard<'_, EventBuffer> {
        // Every mutation leaves the buffer consistent, so a poisoned lock is still usable.
        self.buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
