//! Route planning and congestion optimization endpoints.

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use chrono::Utc;
use drivemind_optimizer::OptimizerStatus;
use drivemind_response::PlanResponse;
use drivemind_routing::RouteRequest;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Plans the fastest route, plus alternates when more than one route is requested.
pub async fn plan(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RouteRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let planner = Arc::clone(&state.planner);
    // Searches are CPU-bound, so keep them off the async workers.
    let routes = tokio::task::spawn_blocking(move || match request.alternates {
        Some(k) if k > 1 => planner.plan_alternates(&request, k),
        _ => planner.plan(&request).map(|route| vec![route]),
    })
    .await??;

    let mut routes = routes.into_iter();
    let route = routes
        .next()
        .ok_or_else(|| ApiError::internal("The planner returned no routes"))?;
    Ok(Json(PlanResponse {
        route,
        alternates: routes.collect(),
    }))
}

#[derive(Deserialize, Default)]
pub struct OptimizeParams {
    /// Turns periodic recomputation on or off before triggering.
    #[serde(default)]
    enabled: Option<bool>,
}

pub async fn optimizer_status(State(state): State<AppState>) -> Json<OptimizerStatus> {
    Json(state.optimizer.status())
}

pub async fn optimize(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<OptimizeParams>,
) -> Result<Json<OptimizerStatus>, ApiError> {
    if let Some(enabled) = params.enabled {
        state.optimizer.set_enabled(enabled);
    }
    let optimizer = Arc::clone(&state.optimizer);
    let status = tokio::task::spawn_blocking(move || optimizer.trigger(Utc::now())).await?;
    info!(
        enabled = status.enabled,
        generation = status.generation,
        "Manual optimization requested"
    );
    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::api::test_support::{request, send};
    use crate::state::fixtures;
    use axum::http::{Method, StatusCode};
    use drivemind_graph::{Location, SegmentId};
    use drivemind_telemetry::{EventKind, RawEvent, Severity};
    use serde_json::{Value, json};

    fn segment_ids(route: &Value) -> Vec<u64> {
        route["segments"]
            .as_array()
            .unwrap()
            .iter()
            .map(|leg| leg["segment"].as_u64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn plans_the_fastest_route() {
        let router = create_router(fixtures::state(None));
        let (status, body) = send(
            router,
            request(
                Method::POST,
                "/api/v1/infer/route/plan",
                Some(json!({"source": 1, "destination": 4})),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(segment_ids(&body), [101, 102, 103]);
        assert_eq!(body["durationSeconds"], 15.0);
        assert_eq!(body["congestion"], "light");
        assert_eq!(body["alternates"], json!([]));
    }

    #[tokio::test]
    async fn returns_alternates_when_asked() {
        let router = create_router(fixtures::state(None));
        let (status, body) = send(
            router,
            request(
                Method::POST,
                "/api/v1/infer/route/plan",
                Some(json!({"source": 1, "destination": 4, "alternates": 3})),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(segment_ids(&body), [101, 102, 103]);
        let alternates = body["alternates"].as_array().unwrap();
        assert_eq!(alternates.len(), 1);
        assert_eq!(segment_ids(&alternates[0]), [104, 105]);
    }

    #[tokio::test]
    async fn rejects_unknown_and_unreachable_nodes() {
        let router = create_router(fixtures::state(None));

        let (status, body) = send(
            router.clone(),
            request(
                Method::POST,
                "/api/v1/infer/route/plan",
                Some(json!({"source": 1, "destination": 99})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_NODE");

        let (status, body) = send(
            router,
            request(
                Method::POST,
                "/api/v1/infer/route/plan",
                Some(json!({"source": 1, "destination": 7})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NO_PATH");
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_requests() {
        let router = create_router(fixtures::state(None));
        let (status, body) = send(
            router,
            request(
                Method::POST,
                "/api/v1/infer/route/plan",
                Some(json!({"source": "somewhere"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn optimize_reweights_from_recent_events() {
        let state = fixtures::state(None);
        state
            .ingest
            .ingest(RawEvent::new(
                Location::Segment(SegmentId::new(102)),
                EventKind::Closure,
                Severity::High,
            ))
            .unwrap();
        let router = create_router(state.clone());

        let (status, body) =
            send(router.clone(), request(Method::GET, "/api/v1/infer/route/optimize", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], true);
        assert_eq!(body["totalRuns"], 0);
        assert_eq!(body["lastRun"], Value::Null);

        let (status, body) =
            send(router, request(Method::POST, "/api/v1/infer/route/optimize", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalRuns"], 1);
        assert_eq!(body["generation"], 1);
        assert_eq!(body["lastReport"]["segmentsUpdated"], 1);

        let (_, live) = state.store.segment_state(SegmentId::new(102)).unwrap();
        assert!(live.multiplier.into_inner() > 4.0);
    }

    #[tokio::test]
    async fn optimize_can_disable_the_optimizer() {
        let state = fixtures::state(None);
        let router = create_router(state.clone());

        let (status, body) = send(
            router,
            request(Method::POST, "/api/v1/infer/route/optimize?enabled=false", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], false);
        assert_eq!(body["totalRuns"], 0);
        assert!(!state.optimizer.is_enabled());
    }
}
