//! # DriveMind road graph
//!
//! The road network (intersections and the segments between them),
//! plus the live congestion weights layered on top of it.
//!
//! The network topology is immutable once built.
//! Live weights are held by a [`RoadGraphStore`], which hands out
//! copy-on-read [`RoadGraph`] snapshots to readers such as the route planner.

mod error;
mod graph;
mod ids;
mod live;
mod multiplier;
pub mod network;
pub mod spatial;
mod store;

// Flatten the most commonly used types for better ergonomics.
pub use error::{GraphError, NetworkBuildError};
pub use graph::{RoadGraph, Traversal};
pub use ids::{Location, NodeId, SegmentId};
pub use live::SegmentState;
pub use multiplier::{CongestionMultiplier, FREE_FLOW};
pub use network::{Node, RoadNetwork, RoadNetworkBuilder, RoadSegment, VehicleType};
pub use store::{RoadGraphStore, WeightChange};
