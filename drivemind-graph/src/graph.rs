use crate::ids::{NodeId, SegmentId};
use crate::live::SegmentState;
use crate::network::{RoadNetwork, RoadSegment};
use std::sync::Arc;

/// A read-only snapshot of the road graph.
///
/// The live state of every segment was copied when the snapshot was taken,
/// so later weight updates are never visible through it.
/// Holding a snapshot does not block writers.
#[derive(Clone, Debug)]
pub struct RoadGraph {
    network: Arc<RoadNetwork>,
    states: Arc<[SegmentState]>,
    generation: u64,
}

/// One way of leaving a node along a segment.
#[derive(Copy, Clone, Debug)]
pub struct Traversal<'a> {
    pub segment: &'a RoadSegment,
    pub state: SegmentState,
    pub from: NodeId,
    pub to: NodeId,
}

impl Traversal<'_> {
    /// Current travel time in seconds (base time scaled by the congestion multiplier).
    pub fn travel_seconds(&self) -> f64 {
        self.segment.base_seconds * self.state.multiplier.into_inner()
    }
}

impl RoadGraph {
    pub(crate) fn new(
        network: Arc<RoadNetwork>,
        states: Arc<[SegmentState]>,
        generation: u64,
    ) -> Self {
        debug_assert_eq!(network.segment_count(), states.len());
        Self {
            network,
            states,
            generation,
        }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// The number of weight updates applied to the store before this snapshot was taken.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.network.contains_node(id)
    }

    /// Looks up a segment along with its live state.
    pub fn segment(&self, id: SegmentId) -> Option<(&RoadSegment, SegmentState)> {
        self.network
            .segment_index(id)
            .map(|idx| (self.network.segment_at(idx), self.states[idx]))
    }

    /// Iterates over all segments with their live state.
    pub fn segments(&self) -> impl Iterator<Item = (&RoadSegment, SegmentState)> {
        self.network
            .segments()
            .iter()
            .zip(self.states.iter().copied())
    }

    /// All traversals leaving the given node, honoring oneway restrictions.
    ///
    /// Empty for unknown nodes.
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = Traversal<'_>> {
        self.network
            .node_index(node)
            .into_iter()
            .flat_map(move |idx| self.network.outgoing(idx).iter())
            .map(move |&(segment_idx, to_idx)| Traversal {
                segment: self.network.segment_at(segment_idx),
                state: self.states[segment_idx],
                from: node,
                to: self.network.node_at(to_idx).id,
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::{RoadGraphStore, RoadNetworkBuilder, RoadSegment};
    use crate::ids::{NodeId, SegmentId};

    #[test]
    fn snapshot_does_not_see_later_updates() {
        let network = RoadNetworkBuilder::new()
            .node(1, 0.0, 0.0)
            .node(2, 0.0, 0.01)
            .segment(RoadSegment::new(7, 1, 2, 1_000.0, 60.0))
            .build()
            .unwrap();
        let store = RoadGraphStore::new(network);

        let before = store.snapshot();
        store.apply_weight_update(SegmentId::new(7), 2.0).unwrap();
        let after = store.snapshot();

        let (_, old_state) = before.segment(SegmentId::new(7)).unwrap();
        let (_, new_state) = after.segment(SegmentId::new(7)).unwrap();
        assert!(old_state.multiplier.is_free_flow());
        assert!((new_state.multiplier.into_inner() - 2.0).abs() < 1e-6);
        assert_eq!(before.generation() + 1, after.generation());
    }

    #[test]
    fn traversal_costs_scale_with_multiplier() {
        let network = RoadNetworkBuilder::new()
            .node(1, 0.0, 0.0)
            .node(2, 0.0, 0.01)
            .segment(RoadSegment::new(7, 1, 2, 1_000.0, 60.0))
            .build()
            .unwrap();
        let store = RoadGraphStore::new(network);
        store.apply_weight_update(SegmentId::new(7), 1.5).unwrap();

        let graph = store.snapshot();
        let traversals: Vec<_> = graph.outgoing(NodeId::new(2)).collect();
        assert_eq!(traversals.len(), 1);
        assert_eq!(traversals[0].to, NodeId::new(1));
        assert!((traversals[0].travel_seconds() - 90.0).abs() < 1e-6);
    }
}
