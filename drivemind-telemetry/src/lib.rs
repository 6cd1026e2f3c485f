//! # DriveMind telemetry
//!
//! Camera and audio reports are normalized into canonical [`TelemetryEvent`]s,
//! kept in a bounded buffer of recent history,
//! and published to anything that wants to react to them
//! (the alert dispatcher and the route optimizer).

pub mod classify;
mod error;
mod event;
mod ingest;

pub use error::{ClassifyError, IngestError};
pub use event::{EventId, EventKind, RawEvent, Severity, TelemetryEvent};
pub use ingest::{IngestConfig, LocationResolver, TelemetryIngest};
