use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identifies an intersection in the road network.
///
/// IDs are assigned by whoever authored the network file;
/// they carry no structure of their own.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

/// Identifies a road segment (an edge between two intersections).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(u64);

impl NodeId {
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Extracts the raw ID value.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl SegmentId {
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Extracts the raw ID value.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<u64> for SegmentId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "node/{}", self.0)
    }
}

impl Display for SegmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "segment/{}", self.0)
    }
}

/// A place in the network that telemetry can be attached to.
///
/// Serialized as `{"node": 3}` or `{"segment": 7}`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Location {
    Node(NodeId),
    Segment(SegmentId),
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Node(id) => id.fmt(f),
            Location::Segment(id) => id.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_prefixed() {
        assert_eq!(NodeId::new(42).to_string(), "node/42");
        assert_eq!(SegmentId::new(7).to_string(), "segment/7");
        assert_eq!(Location::Segment(SegmentId::new(7)).to_string(), "segment/7");
    }

    #[test]
    fn location_wire_format() {
        insta::assert_snapshot!(
            serde_json::to_string(&Location::Node(NodeId::new(3))).unwrap(),
            @r#"{"node":3}"#
        );

        let parsed: Location = serde_json::from_str(r#"{"segment":12}"#).unwrap();
        assert_eq!(parsed, Location::Segment(SegmentId::new(12)));
    }
}
