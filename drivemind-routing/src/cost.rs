use crate::request::Constraints;
use drivemind_graph::Traversal;
use num_traits::Zero;
use std::ops::Add;

/// The accumulated cost of a partial path.
///
/// Ordered by travel time first, then by the number of segments,
/// so among equally fast paths the one with fewer segments wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathCost {
    pub millis: u64,
    pub hops: u32,
}

impl PathCost {
    /// The cost of crossing a single segment in `seconds`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn segment(seconds: f64) -> Self {
        Self {
            millis: (seconds.max(0.0) * 1000.0).round() as u64,
            hops: 1,
        }
    }
}

impl Add for PathCost {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            millis: self.millis.saturating_add(other.millis),
            hops: self.hops.saturating_add(other.hops),
        }
    }
}

impl Zero for PathCost {
    fn zero() -> Self {
        Self::default()
    }

    fn is_zero(&self) -> bool {
        self.millis == 0 && self.hops == 0
    }
}

pub trait Costing {
    fn allowed(&self, traversal: &Traversal<'_>) -> bool;
    fn cost(&self, traversal: &Traversal<'_>) -> PathCost;
}

/// Costs segments by their live travel time, honoring request constraints.
pub struct TravelTimeCosting {
    constraints: Constraints,
}

impl TravelTimeCosting {
    pub fn new(constraints: Constraints) -> Self {
        Self { constraints }
    }
}

impl Costing for TravelTimeCosting {
    fn allowed(&self, traversal: &Traversal<'_>) -> bool {
        let segment = traversal.segment;
        !(self.constraints.avoid_tolls && segment.toll)
            && self
                .constraints
                .vehicle
                .is_none_or(|vehicle| segment.allows(vehicle))
    }

    fn cost(&self, traversal: &Traversal<'_>) -> PathCost {
        PathCost::segment(traversal.travel_seconds())
    }
}
