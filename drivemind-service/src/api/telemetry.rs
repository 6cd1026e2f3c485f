//! Telemetry event ingest and inspection.

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use drivemind_response::{BatchIngestResponse, BatchItem};
use drivemind_telemetry::{RawEvent, TelemetryEvent};
use serde::Deserialize;

const DEFAULT_LIMIT: usize = 50;

#[derive(Deserialize, Default)]
pub struct RecentParams {
    #[serde(default)]
    limit: Option<usize>,
}

/// The most recent events, newest first.
pub async fn recent(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<RecentParams>,
) -> Json<Vec<TelemetryEvent>> {
    Json(state.ingest.recent(params.limit.unwrap_or(DEFAULT_LIMIT)))
}

pub async fn ingest(
    State(state): State<AppState>,
    ApiJson(raw): ApiJson<RawEvent>,
) -> Result<(StatusCode, Json<TelemetryEvent>), ApiError> {
    let event = state.ingest.ingest(raw)?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Ingests every event on its own; rejected events are reported in place.
pub async fn ingest_batch(
    State(state): State<AppState>,
    ApiJson(raws): ApiJson<Vec<RawEvent>>,
) -> Json<BatchIngestResponse> {
    let response = state
        .ingest
        .ingest_batch(raws)
        .into_iter()
        .map(|result| match result {
            Ok(event) => BatchItem::Event(event),
            Err(e) => BatchItem::Error(ApiError::from(e).into_body()),
        })
        .collect();
    Json(response)
}
