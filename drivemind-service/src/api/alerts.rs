use crate::error::ApiError;
use crate::extract::{ApiPath, ApiQuery};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use chrono::Utc;
use drivemind_alerts::{Alert, AlertId};
use serde::Deserialize;

#[derive(Deserialize, Default)]
pub struct ListParams {
    /// Include expired and dismissed alerts.
    #[serde(default)]
    all: bool,
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Json<Vec<Alert>> {
    if params.all {
        Json(state.alerts.all(Utc::now()))
    } else {
        Json(state.alerts.active(Utc::now()))
    }
}

pub async fn dismiss(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Alert>, ApiError> {
    let alert = state.alerts.dismiss(AlertId::new(id), Utc::now())?;
    Ok(Json(alert))
}
