//! Camera and audio report classification.
//!
//! Both endpoints take signals that were already extracted upstream
//! (object detections, a transcript) and ingest an event when they indicate an incident.

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use drivemind_graph::Location;
use drivemind_response::{AnalyzeResponse, ErrorCode, TranscribeResponse};
use drivemind_telemetry::classify::{
    Detection, MediaRef, classify_detections, classify_transcript, summarize,
};
use drivemind_telemetry::IngestError;
use itertools::Itertools;
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    location: Location,
    media: MediaRef,
    #[serde(default)]
    detections: Vec<Detection>,
    /// The reporting camera; defaults to `vision`.
    #[serde(default)]
    source: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeRequest {
    location: Location,
    media: MediaRef,
    transcript: String,
    #[serde(default)]
    source: Option<String>,
}

fn ensure_resolves(state: &AppState, location: Location) -> Result<(), ApiError> {
    if state.store.resolves(location) {
        Ok(())
    } else {
        Err(IngestError::UnknownLocation(location).into())
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let bytes = request.media.validate()?;
    ensure_resolves(&state, request.location)?;

    let Some(classification) = classify_detections(&request.detections)? else {
        debug!(location = %request.location, bytes, "Frame showed nothing to report");
        return Ok(Json(AnalyzeResponse {
            classification: None,
            event: None,
        }));
    };

    let description = format!("Detected {}", classification.evidence.iter().join(", "));
    let raw = classification.to_raw_event(
        request.location,
        request.source.unwrap_or_else(|| "vision".to_string()),
        Some(description),
    );
    let event = state.ingest.ingest(raw)?;
    Ok(Json(AnalyzeResponse {
        classification: Some(classification),
        event: Some(event),
    }))
}

pub async fn transcribe(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TranscribeRequest>,
) -> Result<Json<TranscribeResponse>, ApiError> {
    if !state.audio_detection {
        return Err(ApiError::new(
            ErrorCode::Disabled,
            "Audio detection is disabled on this server",
        ));
    }
    request.media.validate()?;
    ensure_resolves(&state, request.location)?;

    let summary = summarize(&request.transcript);
    let classification = classify_transcript(&request.transcript);
    let event = classification
        .as_ref()
        .map(|classification| {
            state.ingest.ingest(classification.to_raw_event(
                request.location,
                request.source.unwrap_or_else(|| "audio".to_string()),
                Some(summary.clone()),
            ))
        })
        .transpose()?;

    Ok(Json(TranscribeResponse {
        transcription: request.transcript,
        summary,
        classification,
        event,
    }))
}
