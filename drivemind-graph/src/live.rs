//! Live (mutable) per-segment state.
//!
//! Each segment's state is packed into a single 64-bit word
//! so that it can be loaded and stored atomically.
//! A reader therefore always sees a multiplier together with the timestamp
//! of the update that wrote it; never one half of each.

use crate::multiplier::CongestionMultiplier;
use bitfield_struct::bitfield;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub(crate) struct LiveWord {
    /// IEEE 754 single precision bits of the congestion multiplier.
    #[bits(32)]
    multiplier_bits: u32,
    /// Integer seconds UNIX timestamp of the last update.
    ///
    /// This runs out of space in 2106.
    #[bits(32)]
    updated_at: u32,
}

impl LiveWord {
    pub(crate) fn encode(multiplier: CongestionMultiplier, updated_at: DateTime<Utc>) -> Self {
        // Single precision is plenty for a congestion factor.
        #[allow(clippy::cast_possible_truncation)]
        let multiplier = multiplier.into_inner() as f32;
        let seconds = u32::try_from(updated_at.timestamp().max(0)).unwrap_or(u32::MAX);

        LiveWord::new()
            .with_multiplier_bits(multiplier.to_bits())
            .with_updated_at(seconds)
    }

    pub(crate) fn decode(self) -> SegmentState {
        let multiplier = f64::from(f32::from_bits(self.multiplier_bits()));
        SegmentState {
            // Every stored word went through `encode`, which only accepts valid multipliers.
            // The fallback only guards against a zeroed word.
            multiplier: CongestionMultiplier::try_new(multiplier).unwrap_or_default(),
            updated_at: DateTime::from_timestamp(i64::from(self.updated_at()), 0)
                .unwrap_or_default(),
        }
    }
}

/// An atomically updated [`LiveWord`].
#[derive(Debug)]
pub(crate) struct LiveCell(AtomicU64);

impl LiveCell {
    pub(crate) fn new(word: LiveWord) -> Self {
        Self(AtomicU64::new(word.into_bits()))
    }

    pub(crate) fn load(&self) -> LiveWord {
        LiveWord::from_bits(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, word: LiveWord) {
        self.0.store(word.into_bits(), Ordering::Release);
    }
}

/// The live state of a segment at the time it was read.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentState {
    pub multiplier: CongestionMultiplier,
    pub updated_at: DateTime<Utc>,
}
