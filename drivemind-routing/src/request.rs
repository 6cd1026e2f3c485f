use drivemind_graph::{NodeId, VehicleType};
use serde::{Deserialize, Serialize};

/// One end of a route: a node id, or a coordinate snapped to the nearest node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    Node(NodeId),
    Waypoint { lat: f64, lng: f64 },
}

impl From<NodeId> for Endpoint {
    fn from(value: NodeId) -> Self {
        Endpoint::Node(value)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(default)]
    pub avoid_tolls: bool,
    /// Only use segments open to this vehicle type.
    #[serde(default)]
    pub vehicle: Option<VehicleType>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub source: Endpoint,
    pub destination: Endpoint,
    #[serde(default)]
    pub constraints: Constraints,
    /// How many routes to return in total, including the best one.
    #[serde(default)]
    pub alternates: Option<usize>,
}

impl RouteRequest {
    pub fn new(source: impl Into<Endpoint>, destination: impl Into<Endpoint>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            constraints: Constraints::default(),
            alternates: None,
        }
    }

    #[must_use]
    pub fn with_constraints(self, constraints: Constraints) -> Self {
        Self {
            constraints,
            ..self
        }
    }
}
