//! Service status.

use super::AVAILABLE_ACTIONS;
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use chrono::Utc;
use drivemind_response::StatusResponse;
use serde::Deserialize;

#[derive(Deserialize, Default)]
pub struct PingParams {
    #[serde(default)]
    verbose: bool,
}

pub async fn ping(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PingParams>,
) -> Result<Json<StatusResponse>, ApiError> {
    let network = state.store.network();
    let mut response = StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        available_actions: AVAILABLE_ACTIONS.iter().map(ToString::to_string).collect(),
        node_count: network.node_count(),
        segment_count: network.segment_count(),
        generation: state.store.generation(),
        optimizer_enabled: None,
        audio_detection: None,
        buffered_events: None,
        active_alerts: None,
    };

    if params.verbose {
        response.optimizer_enabled = Some(state.optimizer.is_enabled());
        response.audio_detection = Some(state.audio_detection);
        response.buffered_events = Some(state.ingest.len());
        response.active_alerts = Some(state.alerts.active(Utc::now()).len());
    }

    Ok(Json(response))
}
