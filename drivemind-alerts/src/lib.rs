//! # DriveMind alerts
//!
//! Raises alerts for serious telemetry events.
//! Repeated reports of the same kind at the same place coalesce into one alert,
//! alerts that stop being refreshed expire after a TTL,
//! and operators can dismiss them.

mod alert;
mod dispatcher;
mod error;

pub use alert::{Alert, AlertId, AlertState};
pub use dispatcher::{AlertConfig, AlertDispatcher, Observation};
pub use error::AlertError;
