use crate::ids::{NodeId, SegmentId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("{0} does not exist in the road network")]
    NotFound(SegmentId),
    #[error(
        "Invalid congestion multiplier {multiplier} for {segment}; multipliers must be finite and greater than zero"
    )]
    InvalidWeight { segment: SegmentId, multiplier: f64 },
    #[error("Segment lock is poisoned: {0}")]
    PoisonedLock(String),
}

#[derive(Debug, Error)]
pub enum NetworkBuildError {
    #[error("{0} is defined more than once")]
    DuplicateNode(NodeId),
    #[error("{0} is defined more than once")]
    DuplicateSegment(SegmentId),
    #[error("{segment} references {node}, which does not exist")]
    DanglingEndpoint { segment: SegmentId, node: NodeId },
    #[error("{segment} is invalid: {reason}")]
    InvalidSegment {
        segment: SegmentId,
        reason: &'static str,
    },
    #[error("{0} has coordinates outside the valid WGS84 range")]
    InvalidCoordinate(NodeId),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid network JSON: {0}")]
    Json(#[from] serde_json::Error),
}
