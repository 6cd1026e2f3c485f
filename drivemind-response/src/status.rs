use serde::{Deserialize, Serialize};

/// A status response including the service version, loaded network, and capabilities.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// The service version (semver string).
    pub version: String,
    /// A list of actions that this server supports.
    ///
    /// These are the paths under the API base, e.g. `infer/route/plan`.
    pub available_actions: Vec<String>,
    /// Number of intersections in the loaded road network.
    pub node_count: usize,
    /// Number of segments in the loaded road network.
    pub segment_count: usize,
    /// How many congestion weight updates have been applied since startup.
    pub generation: u64,
    // Optional fields which may not always be present
    /// Whether periodic congestion re-weighting is enabled.
    ///
    /// Only included in verbose responses.
    pub optimizer_enabled: Option<bool>,
    /// Whether audio reports are accepted.
    ///
    /// Only included in verbose responses.
    pub audio_detection: Option<bool>,
    /// Number of telemetry events currently retained.
    ///
    /// Only included in verbose responses.
    pub buffered_events: Option<usize>,
    /// Number of alerts currently active.
    ///
    /// Only included in verbose responses.
    pub active_alerts: Option<usize>,
}
