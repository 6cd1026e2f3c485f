//! Shared application state.

use drivemind_alerts::AlertDispatcher;
use drivemind_graph::RoadGraphStore;
use drivemind_optimizer::RouteOptimizer;
use drivemind_routing::RoutePlanner;
use drivemind_telemetry::TelemetryIngest;
use std::sync::Arc;

/// Handles to every component, cheap to clone into each request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RoadGraphStore>,
    pub ingest: Arc<TelemetryIngest<RoadGraphStore>>,
    pub planner: Arc<RoutePlanner>,
    pub optimizer: Arc<RouteOptimizer>,
    pub alerts: Arc<AlertDispatcher>,
    /// Whether audio reports are accepted.
    pub audio_detection: bool,
    /// Bearer token for API routes; `None` disables authentication.
    pub api_token: Option<Arc<str>>,
}
