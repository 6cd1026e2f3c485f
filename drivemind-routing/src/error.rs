use drivemind_graph::NodeId;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("{0} is not in the road network")]
    InvalidNode(NodeId),
    #[error("No road network node near ({lat}, {lng})")]
    InvalidWaypoint { lat: f64, lng: f64 },
    #[error("No route from {origin} to {destination} satisfies the request")]
    NoPath {
        origin: NodeId,
        destination: NodeId,
    },
    #[error("Route search exceeded its {0:?} deadline")]
    Timeout(Duration),
}
