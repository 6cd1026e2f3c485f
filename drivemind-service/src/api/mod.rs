//! API routes and handlers

mod alerts;
mod graph;
mod inference;
mod route;
mod status;
mod telemetry;

use crate::auth;
use crate::error::ApiError;
use crate::state::AppState;
use axum::Router;
use axum::http::Uri;
use axum::middleware;
use axum::routing::{get, post, put};
use drivemind_response::ErrorCode;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Paths under `/api/v1`, as advertised by `/ping`.
pub const AVAILABLE_ACTIONS: &[&str] = &[
    "infer/route/plan",
    "infer/route/optimize",
    "infer/vision/analyze",
    "infer/audio/transcribe",
    "telemetry/events",
    "telemetry/events/batch",
    "alerts",
    "graph/segments",
];

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Inference
        .route("/infer/route/plan", post(route::plan))
        .route(
            "/infer/route/optimize",
            get(route::optimizer_status).post(route::optimize),
        )
        .route("/infer/vision/analyze", post(inference::analyze))
        .route("/infer/audio/transcribe", post(inference::transcribe))
        // Telemetry
        .route(
            "/telemetry/events",
            get(telemetry::recent).post(telemetry::ingest),
        )
        .route("/telemetry/events/batch", post(telemetry::ingest_batch))
        // Alerts
        .route("/alerts", get(alerts::list))
        .route("/alerts/:id/dismiss", post(alerts::dismiss))
        // Road graph
        .route("/graph/segments/:id", get(graph::segment))
        .route(
            "/graph/segments/:id/weight",
            put(graph::set_weight).delete(graph::clear_weight),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        .route("/ping", get(status::ping))
        .nest("/api/v1", api_routes)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("No route for {}", uri.path()))
}
