use crate::error::GraphError;
use crate::graph::RoadGraph;
use crate::ids::{Location, SegmentId};
use crate::live::{LiveCell, LiveWord, SegmentState};
use crate::multiplier::CongestionMultiplier;
use crate::network::{RoadNetwork, RoadSegment};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A keyed lock.
///
/// This enables more granular locking than over an entire data structure.
struct LockTable<K>(DashMap<K, Arc<Mutex<()>>>);

impl<K: std::hash::Hash + Eq + Clone> LockTable<K> {
    fn new() -> Self {
        Self(DashMap::new())
    }

    fn lock_for(&self, k: K) -> Arc<Mutex<()>> {
        self.0
            .entry(k)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// The outcome of a conditional weight update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightChange {
    Applied,
    /// The new multiplier was within epsilon of the current one.
    Unchanged,
    /// An operator has pinned the segment's multiplier.
    Pinned,
}

/// Holds the road network and the live congestion weight of every segment.
///
/// # Concurrency
///
/// - Each segment's live state is a single atomic 64-bit word,
///   so readers never observe a partially applied update.
/// - Writers to the *same* segment serialize on a per-segment lock;
///   writers to different segments never contend.
/// - [`RoadGraphStore::snapshot`] copies every word once (copy-on-read),
///   so a planner working on a snapshot is isolated from concurrent updates
///   without holding any lock for the duration of its search.
///
/// # Pinning
///
/// Operators can pin a segment's multiplier with [`RoadGraphStore::pin_weight`].
/// Conditional updates ([`RoadGraphStore::apply_weight_update_if_changed`])
/// leave pinned segments alone until [`RoadGraphStore::unpin_weight`] is called.
/// Unconditional updates still go through.
pub struct RoadGraphStore {
    network: Arc<RoadNetwork>,
    live: Box<[LiveCell]>,
    lock_table: LockTable<SegmentId>,
    pinned: DashSet<SegmentId>,
    generation: AtomicU64,
}

impl RoadGraphStore {
    /// Creates a store with every segment at free flow.
    pub fn new(network: RoadNetwork) -> Self {
        Self::new_at(network, Utc::now())
    }

    /// Creates a store with every segment at free flow, last updated at `at`.
    pub fn new_at(network: RoadNetwork, at: DateTime<Utc>) -> Self {
        let initial = LiveWord::encode(CongestionMultiplier::default(), at);
        let live = (0..network.segment_count())
            .map(|_| LiveCell::new(initial))
            .collect();

        Self {
            network: Arc::new(network),
            live,
            lock_table: LockTable::new(),
            pinned: DashSet::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// The number of weight updates applied so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether a telemetry location refers to a known node or segment.
    pub fn resolves(&self, location: Location) -> bool {
        self.network.resolves(location)
    }

    /// Takes a consistent, read-only snapshot of the graph.
    pub fn snapshot(&self) -> RoadGraph {
        // Read the generation first so that it never over-reports what the copy contains.
        let generation = self.generation();
        let states = self.live.iter().map(|cell| cell.load().decode()).collect();
        RoadGraph::new(Arc::clone(&self.network), states, generation)
    }

    /// Gets a segment along with its current live state.
    ///
    /// # Errors
    ///
    /// Fails with [`GraphError::NotFound`] if the segment does not exist.
    pub fn segment_state(&self, id: SegmentId) -> Result<(&RoadSegment, SegmentState), GraphError> {
        let idx = self
            .network
            .segment_index(id)
            .ok_or(GraphError::NotFound(id))?;
        Ok((self.network.segment_at(idx), self.live[idx].load().decode()))
    }

    /// Sets the congestion multiplier of a segment.
    ///
    /// # Errors
    ///
    /// - [`GraphError::NotFound`] if the segment is unknown
    /// - [`GraphError::InvalidWeight`] if the multiplier is not a finite, positive number
    ///   that also fits in single precision
    pub fn apply_weight_update(
        &self,
        id: SegmentId,
        multiplier: f64,
    ) -> Result<SegmentState, GraphError> {
        self.apply_weight_update_at(id, multiplier, Utc::now())
    }

    /// Like [`RoadGraphStore::apply_weight_update`], with an explicit update time.
    ///
    /// # Errors
    ///
    /// See [`RoadGraphStore::apply_weight_update`].
    pub fn apply_weight_update_at(
        &self,
        id: SegmentId,
        multiplier: f64,
        at: DateTime<Utc>,
    ) -> Result<SegmentState, GraphError> {
        let (idx, multiplier) = self.validate(id, multiplier)?;

        let lock = self.lock_table.lock_for(id);
        let _guard = lock
            .lock()
            .map_err(|e| GraphError::PoisonedLock(e.to_string()))?;

        Ok(self.write(idx, id, multiplier, at))
    }

    /// Sets the congestion multiplier of a segment,
    /// but only if it is not pinned and differs from the current one by more than `epsilon`.
    ///
    /// The checks and the write happen in the same critical section.
    ///
    /// # Errors
    ///
    /// See [`RoadGraphStore::apply_weight_update`].
    pub fn apply_weight_update_if_changed(
        &self,
        id: SegmentId,
        multiplier: f64,
        epsilon: f64,
        at: DateTime<Utc>,
    ) -> Result<WeightChange, GraphError> {
        let (idx, multiplier) = self.validate(id, multiplier)?;

        let lock = self.lock_table.lock_for(id);
        let _guard = lock
            .lock()
            .map_err(|e| GraphError::PoisonedLock(e.to_string()))?;

        if self.pinned.contains(&id) {
            return Ok(WeightChange::Pinned);
        }
        let current = self.live[idx].load().decode().multiplier.into_inner();
        if (current - multiplier.into_inner()).abs() > epsilon {
            self.write(idx, id, multiplier, at);
            Ok(WeightChange::Applied)
        } else {
            Ok(WeightChange::Unchanged)
        }
    }

    /// Sets the congestion multiplier of a segment and holds it there
    /// until [`RoadGraphStore::unpin_weight`] is called.
    ///
    /// # Errors
    ///
    /// See [`RoadGraphStore::apply_weight_update`].
    pub fn pin_weight(
        &self,
        id: SegmentId,
        multiplier: f64,
        at: DateTime<Utc>,
    ) -> Result<SegmentState, GraphError> {
        let (idx, multiplier) = self.validate(id, multiplier)?;

        let lock = self.lock_table.lock_for(id);
        let _guard = lock
            .lock()
            .map_err(|e| GraphError::PoisonedLock(e.to_string()))?;

        self.pinned.insert(id);
        Ok(self.write(idx, id, multiplier, at))
    }

    /// Releases a pin, leaving the current multiplier in place for the next conditional update.
    ///
    /// Returns whether the segment was pinned.
    ///
    /// # Errors
    ///
    /// Fails with [`GraphError::NotFound`] if the segment does not exist.
    pub fn unpin_weight(&self, id: SegmentId) -> Result<bool, GraphError> {
        if !self.network.contains_segment(id) {
            return Err(GraphError::NotFound(id));
        }

        let lock = self.lock_table.lock_for(id);
        let _guard = lock
            .lock()
            .map_err(|e| GraphError::PoisonedLock(e.to_string()))?;

        Ok(self.pinned.remove(&id).is_some())
    }

    pub fn is_pinned(&self, id: SegmentId) -> bool {
        self.pinned.contains(&id)
    }

    fn validate(
        &self,
        id: SegmentId,
        multiplier: f64,
    ) -> Result<(usize, CongestionMultiplier), GraphError> {
        let idx = self
            .network
            .segment_index(id)
            .ok_or(GraphError::NotFound(id))?;
        let invalid = || GraphError::InvalidWeight {
            segment: id,
            multiplier,
        };
        // Live words hold single precision, so the value must survive narrowing too.
        #[allow(clippy::cast_possible_truncation)]
        let narrowed = multiplier as f32;
        if !narrowed.is_finite() || narrowed <= 0.0 {
            return Err(invalid());
        }
        let multiplier = CongestionMultiplier::try_new(multiplier).map_err(|_| invalid())?;
        Ok((idx, multiplier))
    }

    /// Must be called with the segment lock held.
    fn write(
        &self,
        idx: usize,
        id: SegmentId,
        multiplier: CongestionMultiplier,
        at: DateTime<Utc>,
    ) -> SegmentState {
        let word = LiveWord::encode(multiplier, at);
        self.live[idx].store(word);
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!(segment = %id, %multiplier, "Applied weight update");
        word.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::RoadNetworkBuilder;
    use std::thread;

    fn store() -> RoadGraphStore {
        let network = RoadNetworkBuilder::new()
            .node(1, 0.0, 0.0)
            .node(2, 0.0, 0.01)
            .node(3, 0.0, 0.02)
            .segment(RoadSegment::new(1, 1, 2, 1_000.0, 60.0))
            .segment(RoadSegment::new(2, 2, 3, 1_000.0, 60.0))
            .build()
            .unwrap();
        RoadGraphStore::new(network)
    }

    #[test]
    fn unknown_segment_is_not_found() {
        let store = store();
        assert_eq!(
            store.apply_weight_update(SegmentId::new(99), 2.0),
            Err(GraphError::NotFound(SegmentId::new(99)))
        );
        assert!(matches!(
            store.segment_state(SegmentId::new(99)),
            Err(GraphError::NotFound(_))
        ));
    }

    #[test]
    fn non_positive_multiplier_is_invalid() {
        let store = store();
        for multiplier in [0.0, -2.0, f64::NAN] {
            assert!(matches!(
                store.apply_weight_update(SegmentId::new(1), multiplier),
                Err(GraphError::InvalidWeight { .. })
            ));
        }
        // Nothing was written
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn multiplier_must_fit_single_precision() {
        let store = store();
        for multiplier in [1e39, 1e-46] {
            assert!(matches!(
                store.apply_weight_update(SegmentId::new(1), multiplier),
                Err(GraphError::InvalidWeight { .. })
            ));
            assert!(matches!(
                store.apply_weight_update_if_changed(SegmentId::new(1), multiplier, 0.01, Utc::now()),
                Err(GraphError::InvalidWeight { .. })
            ));
        }
        assert_eq!(store.generation(), 0);

        let state = store.apply_weight_update(SegmentId::new(1), 1e30).unwrap();
        assert!((state.multiplier.into_inner() / 1e30 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn update_records_timestamp() {
        let store = store();
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let state = store
            .apply_weight_update_at(SegmentId::new(2), 3.0, at)
            .unwrap();
        assert_eq!(state.updated_at, at);

        let (segment, state) = store.segment_state(SegmentId::new(2)).unwrap();
        assert_eq!(segment.id, SegmentId::new(2));
        assert!((state.multiplier.into_inner() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn conditional_update_skips_small_changes() {
        let store = store();
        let at = Utc::now();
        assert_eq!(
            store.apply_weight_update_if_changed(SegmentId::new(1), 1.005, 0.01, at),
            Ok(WeightChange::Unchanged)
        );
        assert_eq!(
            store.apply_weight_update_if_changed(SegmentId::new(1), 1.5, 0.01, at),
            Ok(WeightChange::Applied)
        );
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn pinned_segments_ignore_conditional_updates() {
        let store = store();
        let at = Utc::now();
        let state = store.pin_weight(SegmentId::new(2), 3.0, at).unwrap();
        assert!((state.multiplier.into_inner() - 3.0).abs() < 1e-6);
        assert!(store.is_pinned(SegmentId::new(2)));

        assert_eq!(
            store.apply_weight_update_if_changed(SegmentId::new(2), 1.0, 0.01, at),
            Ok(WeightChange::Pinned)
        );
        let (_, state) = store.segment_state(SegmentId::new(2)).unwrap();
        assert!((state.multiplier.into_inner() - 3.0).abs() < 1e-6);

        assert_eq!(store.unpin_weight(SegmentId::new(2)), Ok(true));
        assert_eq!(store.unpin_weight(SegmentId::new(2)), Ok(false));
        assert_eq!(
            store.unpin_weight(SegmentId::new(99)),
            Err(GraphError::NotFound(SegmentId::new(99)))
        );
        assert_eq!(
            store.apply_weight_update_if_changed(SegmentId::new(2), 1.0, 0.01, at),
            Ok(WeightChange::Applied)
        );
    }

    #[test]
    fn concurrent_updates_never_tear() {
        let store = Arc::new(store());
        let writers: Vec<_> = (0..4u32)
            .map(|worker| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..500u32 {
                        let multiplier = f64::from(1 + (worker + i) % 5);
                        let segment = SegmentId::new(u64::from(i % 2) + 1);
                        store.apply_weight_update(segment, multiplier).unwrap();
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            let graph = store.snapshot();
            for (_, state) in graph.segments() {
                let value = state.multiplier.into_inner();
                assert!(
                    (1.0..=5.0).contains(&value) && value.fract() == 0.0,
                    "observed a torn multiplier: {value}"
                );
            }
        }

        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(store.generation(), 2_000);
    }
}
