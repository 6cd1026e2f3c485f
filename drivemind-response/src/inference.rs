use drivemind_routing::RouteResult;
use drivemind_telemetry::TelemetryEvent;
use drivemind_telemetry::classify::Classification;
use serde::{Deserialize, Serialize};

/// A planned route, plus any alternates that were requested.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    #[serde(flatten)]
    pub route: RouteResult,
    /// Further distinct routes, fastest first (never includes `route` itself).
    #[serde(default)]
    pub alternates: Vec<RouteResult>,
}

/// The outcome of analyzing a camera frame.
///
/// Both fields are `null` when the frame showed nothing worth reporting.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub classification: Option<Classification>,
    /// The event ingested for the classification.
    pub event: Option<TelemetryEvent>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeResponse {
    pub transcription: String,
    pub summary: String,
    pub classification: Option<Classification>,
    pub event: Option<TelemetryEvent>,
}
