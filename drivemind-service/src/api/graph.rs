//! Live segment inspection and operator overrides.

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use chrono::Utc;
use drivemind_graph::SegmentId;
use drivemind_response::SegmentResponse;
use serde::Deserialize;
use tracing::info;

#[derive(Deserialize, Debug)]
pub struct WeightUpdate {
    multiplier: f64,
}

pub async fn segment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<SegmentResponse>, ApiError> {
    let id = SegmentId::new(id);
    let (segment, live) = state.store.segment_state(id)?;
    Ok(Json(SegmentResponse::new(segment, live, state.store.is_pinned(id))))
}

/// Pins a segment's congestion multiplier until the override is cleared.
pub async fn set_weight(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(update): ApiJson<WeightUpdate>,
) -> Result<Json<SegmentResponse>, ApiError> {
    let id = SegmentId::new(id);
    let live = state.store.pin_weight(id, update.multiplier, Utc::now())?;
    info!(segment = %id, multiplier = update.multiplier, "Pinned operator weight override");
    let (segment, _) = state.store.segment_state(id)?;
    Ok(Json(SegmentResponse::new(segment, live, true)))
}

/// Clears an operator override, handing the segment back to the optimizer.
pub async fn clear_weight(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<SegmentResponse>, ApiError> {
    let id = SegmentId::new(id);
    if state.store.unpin_weight(id)? {
        info!(segment = %id, "Cleared operator weight override");
    }
    let (segment, live) = state.store.segment_state(id)?;
    Ok(Json(SegmentResponse::new(segment, live, false)))
}
