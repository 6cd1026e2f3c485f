//! # DriveMind route planning
//!
//! Finds the fastest route between two points on a [`RoadGraph`](drivemind_graph::RoadGraph) snapshot,
//! where every segment costs its base travel time scaled by its live congestion multiplier.
//!
//! The planner can also return up to *k* distinct alternates (Yen's algorithm)
//! for side-by-side comparison.

mod cost;
mod error;
mod planner;
mod request;
mod route;

pub use cost::{Costing, PathCost, TravelTimeCosting};
pub use error::PlanError;
pub use planner::{PlannerConfig, RoutePlanner};
pub use request::{Constraints, Endpoint, RouteRequest};
pub use route::{CongestionLevel, RouteLeg, RouteResult};
