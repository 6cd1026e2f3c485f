use nutype::nutype;

/// The multiplier for a segment with no congestion.
pub const FREE_FLOW: f64 = 1.0;

/// A scalar applied to a segment's base travel time to reflect live conditions.
///
/// Always finite and strictly positive.
/// The optimizer only ever produces values of at least [`FREE_FLOW`],
/// but operators may set smaller values (e.g. for a temporarily raised speed limit).
#[nutype(
    validate(finite, greater = 0.0),
    default = 1.0,
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Display, Serialize, Deserialize)
)]
pub struct CongestionMultiplier(f64);

impl CongestionMultiplier {
    /// Whether this multiplier represents free-flowing traffic.
    pub fn is_free_flow(&self) -> bool {
        (self.into_inner() - FREE_FLOW).abs() < f64::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_and_non_finite() {
        assert!(CongestionMultiplier::try_new(0.0).is_err());
        assert!(CongestionMultiplier::try_new(-1.5).is_err());
        assert!(CongestionMultiplier::try_new(f64::NAN).is_err());
        assert!(CongestionMultiplier::try_new(f64::INFINITY).is_err());
    }

    #[test]
    fn default_is_free_flow() {
        let multiplier = CongestionMultiplier::default();
        assert!(multiplier.is_free_flow());
        assert!(!CongestionMultiplier::try_new(2.5).unwrap().is_free_flow());
    }
}
