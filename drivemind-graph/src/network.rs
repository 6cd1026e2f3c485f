//! # Road network topology
//!
//! The static part of the road graph: intersections, the segments between them,
//! and the adjacency structures the planner and optimizer need.
//!
//! Networks are usually loaded from a JSON file with the following shape:
//!
//! ```json
//! {
//!   "nodes": [{ "id": 1, "name": "MG Road", "lat": 12.9756, "lng": 77.6050 }],
//!   "segments": [{ "id": 10, "from": 1, "to": 2, "lengthM": 850.0, "baseSeconds": 75.0 }]
//! }
//! ```
//!
//! Segments are traversable in both directions unless `oneway` is set.

use crate::error::NetworkBuildError;
use crate::ids::{Location, NodeId, SegmentId};
use crate::spatial::NodeIndex;
use enumset::{EnumSet, EnumSetType};
use geo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Vehicle classes that a segment may admit.
#[derive(Debug, Hash, EnumSetType, Serialize, Deserialize)]
#[enumset(serialize_repr = "list")]
#[serde(rename_all = "camelCase")]
pub enum VehicleType {
    Car,
    Truck,
    Bus,
    Motorcycle,
    Emergency,
}

impl VehicleType {
    pub const fn as_str(self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Truck => "truck",
            VehicleType::Bus => "bus",
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::Emergency => "emergency",
        }
    }
}

impl Display for VehicleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnumSet::<VehicleType>::all()
            .iter()
            .find(|vehicle| vehicle.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown vehicle type '{s}'"))
    }
}

/// An intersection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

impl Node {
    /// The node location as a geo point (x = longitude, y = latitude).
    pub fn point(&self) -> Point {
        Point::new(self.lng, self.lat)
    }
}

/// The static attributes of a road segment.
///
/// The live congestion state lives in the [`RoadGraphStore`](crate::RoadGraphStore).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadSegment {
    pub id: SegmentId,
    pub from: NodeId,
    pub to: NodeId,
    pub length_m: f64,
    /// Free-flow travel time in seconds.
    pub base_seconds: f64,
    #[serde(default)]
    pub oneway: bool,
    #[serde(default)]
    pub toll: bool,
    #[serde(default = "EnumSet::all")]
    pub vehicles: EnumSet<VehicleType>,
}

impl RoadSegment {
    /// Creates a two-way segment open to all vehicles.
    pub fn new(
        id: impl Into<SegmentId>,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        length_m: f64,
        base_seconds: f64,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            length_m,
            base_seconds,
            oneway: false,
            toll: false,
            vehicles: EnumSet::all(),
        }
    }

    #[must_use]
    pub fn oneway(self) -> Self {
        Self {
            oneway: true,
            ..self
        }
    }

    #[must_use]
    pub fn toll(self) -> Self {
        Self { toll: true, ..self }
    }

    #[must_use]
    pub fn with_vehicles(self, vehicles: EnumSet<VehicleType>) -> Self {
        Self { vehicles, ..self }
    }

    pub fn allows(&self, vehicle: VehicleType) -> bool {
        self.vehicles.contains(vehicle)
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }

    fn validate(&self) -> Result<(), NetworkBuildError> {
        let invalid = |reason| NetworkBuildError::InvalidSegment {
            segment: self.id,
            reason,
        };

        if !(self.base_seconds.is_finite() && self.base_seconds > 0.0) {
            Err(invalid("base travel time must be a positive number of seconds"))
        } else if !(self.length_m.is_finite() && self.length_m >= 0.0) {
            Err(invalid("length must be a non-negative number of meters"))
        } else if self.from == self.to {
            Err(invalid("segments may not start and end at the same node"))
        } else if self.vehicles.is_empty() {
            Err(invalid("at least one vehicle type must be allowed"))
        } else {
            Ok(())
        }
    }
}

/// An immutable road network.
#[derive(Debug)]
pub struct RoadNetwork {
    nodes: Vec<Node>,
    node_lookup: HashMap<NodeId, usize>,
    segments: Vec<RoadSegment>,
    segment_lookup: HashMap<SegmentId, usize>,
    /// (segment index, destination node index) for every traversal leaving a node.
    outgoing: Vec<Vec<(usize, usize)>>,
    /// Indexes of the segments touching each node, regardless of direction.
    incident: Vec<Vec<usize>>,
    spatial: NodeIndex,
}

#[derive(Deserialize)]
struct NetworkFile {
    nodes: Vec<Node>,
    segments: Vec<RoadSegment>,
}

impl RoadNetwork {
    /// Loads a network from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, malformed JSON, or a network that fails validation
    /// (see [`RoadNetworkBuilder::build`]).
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, NetworkBuildError> {
        let file = std::fs::File::open(path)?;
        Self::from_json_reader(std::io::BufReader::new(file))
    }

    /// Loads a network from any JSON byte stream.
    ///
    /// # Errors
    ///
    /// See [`RoadNetwork::from_json_file`].
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, NetworkBuildError> {
        let file: NetworkFile = serde_json::from_reader(reader)?;
        RoadNetworkBuilder {
            nodes: file.nodes,
            segments: file.segments,
        }
        .build()
    }

    /// Loads a network from a JSON string.
    ///
    /// # Errors
    ///
    /// See [`RoadNetwork::from_json_file`].
    pub fn from_json_str(json: &str) -> Result<Self, NetworkBuildError> {
        Self::from_json_reader(json.as_bytes())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_lookup.get(&id).map(|&idx| &self.nodes[idx])
    }

    pub fn segment(&self, id: SegmentId) -> Option<&RoadSegment> {
        self.segment_lookup.get(&id).map(|&idx| &self.segments[idx])
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_lookup.contains_key(&id)
    }

    pub fn contains_segment(&self, id: SegmentId) -> bool {
        self.segment_lookup.contains_key(&id)
    }

    /// Whether the location refers to something in this network.
    pub fn resolves(&self, location: Location) -> bool {
        match location {
            Location::Node(id) => self.contains_node(id),
            Location::Segment(id) => self.contains_segment(id),
        }
    }

    /// All segments touching the node (in either direction).
    ///
    /// Empty for unknown nodes.
    pub fn segments_at(&self, node: NodeId) -> impl Iterator<Item = &RoadSegment> {
        self.node_lookup
            .get(&node)
            .into_iter()
            .flat_map(move |&idx| {
                self.incident[idx]
                    .iter()
                    .map(move |&seg| &self.segments[seg])
            })
    }

    /// Finds the node closest to the given coordinate.
    ///
    /// Returns the node ID and the great-circle distance to it in meters,
    /// or `None` if the network has no nodes.
    pub fn nearest_node(&self, lat: f64, lng: f64) -> Option<(NodeId, f64)> {
        self.spatial.nearest(Point::new(lng, lat))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub(crate) fn node_index(&self, id: NodeId) -> Option<usize> {
        self.node_lookup.get(&id).copied()
    }

    pub(crate) fn segment_index(&self, id: SegmentId) -> Option<usize> {
        self.segment_lookup.get(&id).copied()
    }

    pub(crate) fn outgoing(&self, node_idx: usize) -> &[(usize, usize)] {
        &self.outgoing[node_idx]
    }

    pub(crate) fn node_at(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub(crate) fn segment_at(&self, idx: usize) -> &RoadSegment {
        &self.segments[idx]
    }
}

/// Collects nodes and segments, then validates them into a [`RoadNetwork`].
#[derive(Debug, Default)]
pub struct RoadNetworkBuilder {
    nodes: Vec<Node>,
    segments: Vec<RoadSegment>,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an intersection.
    #[must_use]
    pub fn node(mut self, id: impl Into<NodeId>, lat: f64, lng: f64) -> Self {
        self.nodes.push(Node {
            id: id.into(),
            name: None,
            lat,
            lng,
        });
        self
    }

    /// Adds a fully specified intersection.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    #[must_use]
    pub fn segment(mut self, segment: RoadSegment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Validates the collected parts and builds the adjacency structures.
    ///
    /// # Errors
    ///
    /// - Duplicate node or segment IDs
    /// - Segments referring to nodes that were never added
    /// - Segments with non-positive travel times, negative lengths, loops, or no allowed vehicles
    /// - Nodes with coordinates outside the WGS84 range
    pub fn build(self) -> Result<RoadNetwork, NetworkBuildError> {
        let RoadNetworkBuilder { nodes, segments } = self;

        let mut node_lookup = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            if !((-90.0..=90.0).contains(&node.lat) && (-180.0..=180.0).contains(&node.lng)) {
                return Err(NetworkBuildError::InvalidCoordinate(node.id));
            }
            if node_lookup.insert(node.id, idx).is_some() {
                return Err(NetworkBuildError::DuplicateNode(node.id));
            }
        }

        let mut segment_lookup = HashMap::with_capacity(segments.len());
        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incident = vec![Vec::new(); nodes.len()];
        for (idx, segment) in segments.iter().enumerate() {
            segment.validate()?;
            if segment_lookup.insert(segment.id, idx).is_some() {
                return Err(NetworkBuildError::DuplicateSegment(segment.id));
            }

            let endpoint = |node: NodeId| {
                node_lookup
                    .get(&node)
                    .copied()
                    .ok_or(NetworkBuildError::DanglingEndpoint {
                        segment: segment.id,
                        node,
                    })
            };
            let from = endpoint(segment.from)?;
            let to = endpoint(segment.to)?;

            outgoing[from].push((idx, to));
            if !segment.oneway {
                outgoing[to].push((idx, from));
            }
            incident[from].push(idx);
            incident[to].push(idx);
        }

        let spatial = NodeIndex::new(&nodes);

        Ok(RoadNetwork {
            nodes,
            node_lookup,
            segments,
            segment_lookup,
            outgoing,
            incident,
            spatial,
        })
    }
}
