use chrono::{DateTime, Utc};
use drivemind_graph::{RoadSegment, SegmentState};
use serde::{Deserialize, Serialize};

/// A road segment with its live congestion state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentResponse {
    #[serde(flatten)]
    pub segment: RoadSegment,
    pub multiplier: f64,
    /// Base travel time scaled by the multiplier.
    pub live_seconds: f64,
    pub updated_at: DateTime<Utc>,
    /// Whether an operator has pinned the multiplier against recomputation.
    pub pinned: bool,
}

impl SegmentResponse {
    pub fn new(segment: &RoadSegment, state: SegmentState, pinned: bool) -> Self {
        let multiplier = state.multiplier.into_inner();
        Self {
            live_seconds: segment.base_seconds * multiplier,
            segment: segment.clone(),
            multiplier,
            updated_at: state.updated_at,
            pinned,
        }
    }
}
