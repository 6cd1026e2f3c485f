//! # Spatial lookups
//!
//! Waypoints arrive as raw coordinates and have to be snapped onto the network.

use crate::ids::NodeId;
use crate::network::Node;
use geo::{Distance, Haversine, Point};
use rstar::RTree;
use rstar::primitives::GeomWithData;

type IndexedNode = GeomWithData<[f64; 2], NodeId>;

/// An R-tree over node locations.
///
/// The tree is built in plain lon/lat degrees,
/// which is fine for picking a nearest neighbor at city scale,
/// but the reported distance is always a proper great-circle distance.
#[derive(Debug)]
pub(crate) struct NodeIndex(RTree<IndexedNode>);

impl NodeIndex {
    pub(crate) fn new(nodes: &[Node]) -> Self {
        let entries = nodes
            .iter()
            .map(|node| GeomWithData::new([node.lng, node.lat], node.id))
            .collect();
        Self(RTree::bulk_load(entries))
    }

    pub(crate) fn nearest(&self, point: Point) -> Option<(NodeId, f64)> {
        self.0.nearest_neighbor(&[point.x(), point.y()]).map(|entry| {
            let [lng, lat] = *entry.geom();
            (entry.data, Haversine.distance(point, Point::new(lng, lat)))
        })
    }
}

/// Great-circle distance in meters between two nodes.
pub fn distance_between(a: &Node, b: &Node) -> f64 {
    Haversine.distance(a.point(), b.point())
}
