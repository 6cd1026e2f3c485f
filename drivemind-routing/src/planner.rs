use crate::cost::{Costing, PathCost, TravelTimeCosting};
use crate::error::PlanError;
use crate::request::{Endpoint, RouteRequest};
use crate::route::{RouteLeg, RouteResult};
use drivemind_graph::{NodeId, RoadGraph, RoadGraphStore, Traversal};
use itertools::Itertools;
use pathfinding::prelude::{dijkstra, yen};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Clone, Copy, Debug)]
pub struct PlannerConfig {
    /// Searches running longer than this are abandoned.
    pub timeout: Duration,
    /// Upper bound on the number of routes returned by [`RoutePlanner::plan_alternates`].
    pub max_alternates: NonZeroUsize,
    /// Waypoints farther than this (in meters) from every node are rejected.
    pub max_snap_distance_m: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_alternates: NonZeroUsize::new(3).unwrap_or(NonZeroUsize::MIN),
            max_snap_distance_m: 2_000.0,
        }
    }
}

/// Plans routes on snapshots of a [`RoadGraphStore`].
///
/// Every call takes its own snapshot,
/// so a search is never affected by weight updates that land while it runs.
pub struct RoutePlanner {
    store: Arc<RoadGraphStore>,
    config: PlannerConfig,
}

/// The search state shared by one planning call.
struct Search<'a, C> {
    graph: &'a RoadGraph,
    costing: C,
    deadline: Instant,
    timed_out: bool,
}

impl<C: Costing> Search<'_, C> {
    fn successors(&mut self, node: NodeId) -> Vec<(NodeId, PathCost)> {
        if Instant::now() >= self.deadline {
            self.timed_out = true;
            return Vec::new();
        }
        self.graph
            .outgoing(node)
            .filter(|traversal| self.costing.allowed(traversal))
            .map(|traversal| (traversal.to, self.costing.cost(&traversal)))
            .collect()
    }

    /// Picks the cheapest allowed segment between two adjacent nodes.
    fn leg(&self, from: NodeId, to: NodeId) -> Option<Traversal<'_>> {
        self.graph
            .outgoing(from)
            .filter(|traversal| traversal.to == to && self.costing.allowed(traversal))
            .min_by_key(|traversal| self.costing.cost(traversal))
    }

    fn route(&self, nodes: &[NodeId]) -> Option<RouteResult> {
        let (&source, &destination) = (nodes.first()?, nodes.last()?);
        let legs = nodes
            .iter()
            .tuple_windows()
            .map(|(&from, &to)| self.leg(from, to).map(|traversal| RouteLeg::from(&traversal)))
            .collect::<Option<Vec<_>>>()?;
        Some(RouteResult::new(
            source,
            destination,
            legs,
            self.graph.generation(),
        ))
    }
}

impl RoutePlanner {
    pub fn new(store: Arc<RoadGraphStore>, config: PlannerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Finds the fastest route for a request.
    ///
    /// Among equally fast routes, the one crossing fewer segments is returned.
    /// Planning from a node to itself yields an empty route.
    ///
    /// # Errors
    ///
    /// - [`PlanError::InvalidNode`] or [`PlanError::InvalidWaypoint`] if an endpoint cannot be resolved
    /// - [`PlanError::NoPath`] if the destination is unreachable under the request constraints
    /// - [`PlanError::Timeout`] if the search exceeds the configured deadline
    pub fn plan(&self, request: &RouteRequest) -> Result<RouteResult, PlanError> {
        let graph = self.store.snapshot();
        let (source, destination) = self.endpoints(&graph, request)?;
        let mut search = self.search(&graph, request);

        let found = dijkstra(
            &source,
            |node| search.successors(*node),
            |node| *node == destination,
        );
        if search.timed_out {
            return Err(PlanError::Timeout(self.config.timeout));
        }

        let route = found
            .and_then(|(nodes, _)| search.route(&nodes))
            .ok_or(PlanError::NoPath {
                origin: source,
                destination,
            })?;
        debug!(
            %source,
            %destination,
            segments = route.segments.len(),
            duration = route.duration_seconds,
            "Planned route"
        );
        Ok(route)
    }

    /// Finds up to `k` distinct routes for a request, fastest first.
    ///
    /// `k` is clamped to between one and the configured maximum.
    /// No two returned routes cross exactly the same segments.
    ///
    /// # Errors
    ///
    /// See [`RoutePlanner::plan`].
    pub fn plan_alternates(
        &self,
        request: &RouteRequest,
        k: usize,
    ) -> Result<Vec<RouteResult>, PlanError> {
        let k = k.clamp(1, self.config.max_alternates.get());
        let graph = self.store.snapshot();
        let (source, destination) = self.endpoints(&graph, request)?;
        let mut search = self.search(&graph, request);

        let paths = yen(
            &source,
            |node| search.successors(*node),
            |node| *node == destination,
            k,
        );
        if search.timed_out {
            return Err(PlanError::Timeout(self.config.timeout));
        }

        let routes: Vec<_> = paths
            .iter()
            .filter_map(|(nodes, _)| search.route(nodes))
            .collect();
        if routes.is_empty() {
            return Err(PlanError::NoPath {
                origin: source,
                destination,
            });
        }
        debug!(%source, %destination, requested = k, found = routes.len(), "Planned alternates");
        Ok(routes)
    }

    fn search<'a>(
        &self,
        graph: &'a RoadGraph,
        request: &RouteRequest,
    ) -> Search<'a, TravelTimeCosting> {
        Search {
            graph,
            costing: TravelTimeCosting::new(request.constraints),
            deadline: Instant::now() + self.config.timeout,
            timed_out: false,
        }
    }

    fn endpoints(
        &self,
        graph: &RoadGraph,
        request: &RouteRequest,
    ) -> Result<(NodeId, NodeId), PlanError> {
        Ok((
            self.resolve(graph, request.source)?,
            self.resolve(graph, request.destination)?,
        ))
    }

    fn resolve(&self, graph: &RoadGraph, endpoint: Endpoint) -> Result<NodeId, PlanError> {
        match endpoint {
            Endpoint::Node(id) if graph.contains_node(id) => Ok(id),
            Endpoint::Node(id) => Err(PlanError::InvalidNode(id)),
            Endpoint::Waypoint { lat, lng } => graph
                .network()
                .nearest_node(lat, lng)
                .filter(|(_, distance)| *distance <= self.config.max_snap_distance_m)
                .map(|(id, _)| id)
                .ok_or(PlanError::InvalidWaypoint { lat, lng }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Constraints;
    use drivemind_graph::{
        RoadNetwork, RoadNetworkBuilder, RoadSegment, SegmentId, VehicleType,
    };
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn fixture() -> RoadNetwork {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("fixtures")
            .join("sample-network.json");
        RoadNetwork::from_json_file(path).expect("Unable to load fixture network")
    }

    fn planner(network: RoadNetwork) -> (Arc<RoadGraphStore>, RoutePlanner) {
        let store = Arc::new(RoadGraphStore::new(network));
        let planner = RoutePlanner::new(Arc::clone(&store), PlannerConfig::default());
        (store, planner)
    }

    fn ids(values: &[u64]) -> Vec<SegmentId> {
        values.iter().copied().map(SegmentId::new).collect()
    }

    /// A-B-C-D, each segment five seconds at free flow.
    fn linear() -> RoadNetwork {
        RoadNetworkBuilder::new()
            .node(1, 12.9756, 77.6066)
            .node(2, 12.9730, 77.6170)
            .node(3, 12.9610, 77.6380)
            .node(4, 12.9590, 77.6480)
            .segment(RoadSegment::new(101, 1, 2, 1_150.0, 5.0))
            .segment(RoadSegment::new(102, 2, 3, 2_600.0, 5.0))
            .segment(RoadSegment::new(103, 3, 4, 1_100.0, 5.0))
            .build()
            .unwrap()
    }

    #[test]
    fn linear_route_follows_congestion() {
        let (store, planner) = planner(linear());
        let request = RouteRequest::new(NodeId::new(1), NodeId::new(4));

        let route = planner.plan(&request).unwrap();
        assert_eq!(route.segment_ids(), ids(&[101, 102, 103]));
        assert!((route.duration_seconds - 15.0).abs() < 1e-6);

        store
            .apply_weight_update(SegmentId::new(102), 3.0)
            .unwrap();
        let route = planner.plan(&request).unwrap();
        assert_eq!(route.segment_ids(), ids(&[101, 102, 103]));
        assert!((route.duration_seconds - 25.0).abs() < 1e-6);
        assert!((route.base_duration_seconds - 15.0).abs() < 1e-6);
        assert_eq!(route.generation, 1);
    }

    #[test]
    fn congestion_diverts_to_the_detour() {
        let (store, planner) = planner(fixture());
        let request = RouteRequest::new(NodeId::new(1), NodeId::new(4));
        assert_eq!(
            planner.plan(&request).unwrap().segment_ids(),
            ids(&[101, 102, 103])
        );

        store
            .apply_weight_update(SegmentId::new(102), 3.0)
            .unwrap();
        let route = planner.plan(&request).unwrap();
        assert_eq!(route.segment_ids(), ids(&[104, 105]));
        assert!((route.duration_seconds - 18.0).abs() < 1e-6);
    }

    #[test]
    fn same_source_and_destination_is_empty() {
        let (_, planner) = planner(fixture());
        let route = planner
            .plan(&RouteRequest::new(NodeId::new(3), NodeId::new(3)))
            .unwrap();
        assert!(route.is_empty());
        assert!(route.distance.abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_and_unreachable_nodes() {
        let (_, planner) = planner(fixture());
        assert_eq!(
            planner.plan(&RouteRequest::new(NodeId::new(1), NodeId::new(99))),
            Err(PlanError::InvalidNode(NodeId::new(99)))
        );
        assert_eq!(
            planner.plan(&RouteRequest::new(NodeId::new(1), NodeId::new(7))),
            Err(PlanError::NoPath {
                origin: NodeId::new(1),
                destination: NodeId::new(7)
            })
        );
    }

    #[test]
    fn oneway_segments_are_respected() {
        let (_, planner) = planner(fixture());
        // D -> F is oneway, so F can only reach D by going back through A
        let route = planner
            .plan(&RouteRequest::new(NodeId::new(6), NodeId::new(4)))
            .unwrap();
        assert_eq!(route.segment_ids(), ids(&[107, 101, 102, 103]));
    }

    #[test]
    fn constraints_exclude_segments() {
        let (_, planner) = planner(fixture());
        let request = RouteRequest::new(NodeId::new(4), NodeId::new(6));
        assert_eq!(planner.plan(&request).unwrap().segment_ids(), ids(&[106]));

        // The toll road is the only way back from F.
        let back = RouteRequest::new(NodeId::new(6), NodeId::new(1));
        assert!(planner.plan(&back).is_ok());
        for constraints in [
            Constraints {
                avoid_tolls: true,
                vehicle: None,
            },
            Constraints {
                avoid_tolls: false,
                vehicle: Some(VehicleType::Truck),
            },
        ] {
            assert!(matches!(
                planner.plan(&back.clone().with_constraints(constraints)),
                Err(PlanError::NoPath { .. })
            ));
        }
    }

    #[test]
    fn waypoints_snap_to_the_nearest_node() {
        let (_, planner) = planner(fixture());
        let request = RouteRequest::new(
            Endpoint::Waypoint {
                lat: 12.9757,
                lng: 77.6065,
            },
            Endpoint::Waypoint {
                lat: 12.9591,
                lng: 77.6479,
            },
        );
        let route = planner.plan(&request).unwrap();
        assert_eq!(route.source, NodeId::new(1));
        assert_eq!(route.destination, NodeId::new(4));

        let far_away = RouteRequest::new(
            Endpoint::Waypoint {
                lat: 48.85,
                lng: 2.35,
            },
            NodeId::new(4),
        );
        assert!(matches!(
            planner.plan(&far_away),
            Err(PlanError::InvalidWaypoint { .. })
        ));
    }

    #[test]
    fn expired_deadline_times_out() {
        let store = Arc::new(RoadGraphStore::new(fixture()));
        let planner = RoutePlanner::new(
            store,
            PlannerConfig {
                timeout: Duration::ZERO,
                ..PlannerConfig::default()
            },
        );
        assert_eq!(
            planner.plan(&RouteRequest::new(NodeId::new(1), NodeId::new(4))),
            Err(PlanError::Timeout(Duration::ZERO))
        );
    }

    #[test]
    fn equal_cost_prefers_fewer_segments() {
        let network = RoadNetworkBuilder::new()
            .node(1, 0.0, 0.0)
            .node(2, 0.0, 0.01)
            .node(3, 0.0, 0.02)
            .segment(RoadSegment::new(1, 1, 2, 500.0, 4.0))
            .segment(RoadSegment::new(2, 2, 3, 500.0, 6.0))
            .segment(RoadSegment::new(3, 1, 3, 1_200.0, 10.0))
            .build()
            .unwrap();
        let (_, planner) = planner(network);
        let route = planner
            .plan(&RouteRequest::new(NodeId::new(1), NodeId::new(3)))
            .unwrap();
        assert_eq!(route.segment_ids(), ids(&[3]));
    }

    /// A 3x3 grid with two-way streets; plenty of distinct routes from corner to corner.
    fn grid() -> RoadNetwork {
        let mut builder = RoadNetworkBuilder::new();
        for row in 0..3u32 {
            for col in 0..3u32 {
                builder = builder.node(
                    u64::from(row * 3 + col + 1),
                    f64::from(row) * 0.01,
                    f64::from(col) * 0.01,
                );
            }
        }
        let mut id = 0u64;
        for row in 0..3u64 {
            for col in 0..3u64 {
                let node = row * 3 + col + 1;
                if col < 2 {
                    id += 1;
                    builder = builder.segment(RoadSegment::new(id, node, node + 1, 1_000.0, 60.0));
                }
                if row < 2 {
                    id += 1;
                    builder = builder.segment(RoadSegment::new(id, node, node + 3, 1_000.0, 60.0));
                }
            }
        }
        builder.build().unwrap()
    }

    #[test]
    fn alternates_are_distinct_and_sorted() {
        let (_, planner) = planner(grid());
        let routes = planner
            .plan_alternates(&RouteRequest::new(NodeId::new(1), NodeId::new(9)), 3)
            .unwrap();
        assert_eq!(routes.len(), 3);

        let distinct: HashSet<_> = routes.iter().map(RouteResult::segment_ids).collect();
        assert_eq!(distinct.len(), 3);
        assert!(
            routes
                .iter()
                .tuple_windows()
                .all(|(a, b)| a.duration_seconds <= b.duration_seconds)
        );
    }

    #[test]
    fn alternates_are_capped() {
        let (_, planner) = planner(grid());
        let routes = planner
            .plan_alternates(&RouteRequest::new(NodeId::new(1), NodeId::new(9)), 10)
            .unwrap();
        assert_eq!(routes.len(), 3);
    }

    #[test]
    fn alternates_stop_when_routes_run_out() {
        let (_, planner) = planner(fixture());
        let routes = planner
            .plan_alternates(&RouteRequest::new(NodeId::new(1), NodeId::new(4)), 3)
            .unwrap();
        let found: Vec<_> = routes.iter().map(RouteResult::segment_ids).collect();
        assert_eq!(found, vec![ids(&[101, 102, 103]), ids(&[104, 105])]);
    }

    fn random_network() -> impl Strategy<Value = (RoadNetwork, u64, u64)> {
        (2..10u64).prop_flat_map(|nodes| {
            let segment = (1..=nodes, 1..=nodes, 1..120u32, any::<bool>());
            (
                Just(nodes),
                prop::collection::vec(segment, 1..30),
                1..=nodes,
                1..=nodes,
            )
                .prop_map(|(nodes, segments, source, destination)| {
                    let mut builder = RoadNetworkBuilder::new();
                    for id in 1..=nodes {
                        #[allow(clippy::cast_precision_loss)]
                        let offset = id as f64 * 0.001;
                        builder = builder.node(id, 12.9 + offset, 77.6 + offset);
                    }
                    for (idx, (from, to, seconds, oneway)) in segments
                        .into_iter()
                        .filter(|(from, to, _, _)| from != to)
                        .enumerate()
                    {
                        let segment = RoadSegment::new(
                            idx as u64 + 1,
                            from,
                            to,
                            100.0,
                            f64::from(seconds),
                        );
                        builder = builder.segment(if oneway { segment.oneway() } else { segment });
                    }
                    (builder.build().unwrap(), source, destination)
                })
        })
    }

    proptest! {
        #[test]
        fn routes_are_contiguous((network, source, destination) in random_network()) {
            let (_, planner) = planner(network);
            let request = RouteRequest::new(NodeId::new(source), NodeId::new(destination));
            match planner.plan(&request) {
                Ok(route) => {
                    prop_assert_eq!(route.source, NodeId::new(source));
                    prop_assert_eq!(route.destination, NodeId::new(destination));
                    let nodes = route.nodes();
                    prop_assert_eq!(nodes.last().copied(), Some(NodeId::new(destination)));
                    for (leg, next) in route.segments.iter().tuple_windows() {
                        prop_assert_eq!(leg.to, next.from);
                    }
                    if let Some(first) = route.segments.first() {
                        prop_assert_eq!(first.from, NodeId::new(source));
                    }
                }
                Err(error) => {
                    let is_no_path = matches!(error, PlanError::NoPath { .. });
                    prop_assert!(is_no_path);
                }
            }
        }
    }
}
