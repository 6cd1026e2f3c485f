//! # DriveMind route optimizer
//!
//! Periodically folds recent telemetry into the congestion multipliers of the road graph.
//! Every event contributes a weight that depends on its kind and severity
//! and halves with every decay half-life, so congestion fades back to free flow
//! once reports stop arriving.

mod config;
mod optimizer;
mod runner;

pub use config::{OptimizerConfig, RefreshInterval};
pub use optimizer::{RecomputeReport, RouteOptimizer, event_weight};
pub use runner::OptimizerStatus;
