use drivemind_graph::{NodeId, SegmentId, Traversal};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// How congested a route (or leg) is, from the ratio of live to free-flow travel time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    Light,
    Moderate,
    Heavy,
    Severe,
}

impl CongestionLevel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio.is_nan() || ratio < 1.15 {
            CongestionLevel::Light
        } else if ratio < 1.5 {
            CongestionLevel::Moderate
        } else if ratio < 2.5 {
            CongestionLevel::Heavy
        } else {
            CongestionLevel::Severe
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            CongestionLevel::Light => "light",
            CongestionLevel::Moderate => "moderate",
            CongestionLevel::Heavy => "heavy",
            CongestionLevel::Severe => "severe",
        }
    }
}

impl Display for CongestionLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single segment crossed by a route, in the direction of travel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    pub segment: SegmentId,
    pub from: NodeId,
    pub to: NodeId,
    pub length_m: f64,
    pub base_seconds: f64,
    pub live_seconds: f64,
    pub congestion: CongestionLevel,
}

impl From<&Traversal<'_>> for RouteLeg {
    fn from(traversal: &Traversal<'_>) -> Self {
        let base_seconds = traversal.segment.base_seconds;
        let live_seconds = traversal.travel_seconds();
        Self {
            segment: traversal.segment.id,
            from: traversal.from,
            to: traversal.to,
            length_m: traversal.segment.length_m,
            base_seconds,
            live_seconds,
            congestion: CongestionLevel::from_ratio(live_seconds / base_seconds),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub source: NodeId,
    pub destination: NodeId,
    /// Total length in meters.
    pub distance: f64,
    /// Estimated travel time in seconds at current congestion.
    pub duration_seconds: f64,
    /// Travel time in seconds at free flow.
    pub base_duration_seconds: f64,
    pub congestion: CongestionLevel,
    pub segments: Vec<RouteLeg>,
    /// Graph generation of the snapshot the route was planned on.
    pub generation: u64,
}

impl RouteResult {
    pub(crate) fn new(
        source: NodeId,
        destination: NodeId,
        segments: Vec<RouteLeg>,
        generation: u64,
    ) -> Self {
        let distance = segments.iter().map(|leg| leg.length_m).sum();
        let duration_seconds: f64 = segments.iter().map(|leg| leg.live_seconds).sum();
        let base_duration_seconds: f64 = segments.iter().map(|leg| leg.base_seconds).sum();
        let congestion = if segments.is_empty() {
            CongestionLevel::Light
        } else {
            CongestionLevel::from_ratio(duration_seconds / base_duration_seconds)
        };

        Self {
            source,
            destination,
            distance,
            duration_seconds,
            base_duration_seconds,
            congestion,
            segments,
            generation,
        }
    }

    /// The segment ids along the route, in order.
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.segments.iter().map(|leg| leg.segment).collect()
    }

    /// The nodes visited, in order, including both endpoints.
    pub fn nodes(&self) -> Vec<NodeId> {
        std::iter::once(self.source)
            .chain(self.segments.iter().map(|leg| leg.to))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
