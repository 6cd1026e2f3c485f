//! API error handling

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::response::{IntoResponse, Response};
use drivemind_alerts::AlertError;
use drivemind_graph::GraphError;
use drivemind_response::{ErrorBody, ErrorCode};
use drivemind_routing::PlanError;
use drivemind_telemetry::{ClassifyError, IngestError};
use tracing::error;

/// An error returned to API clients as `{"message": …, "code": …}`.
#[derive(Debug)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn into_body(self) -> ErrorBody {
        ErrorBody::new(self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.code == ErrorCode::Internal {
            error!("{}", self.message);
        }
        (self.code.status(), Json(self.into_body())).into_response()
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        let code = match &err {
            PlanError::InvalidNode(_) | PlanError::InvalidWaypoint { .. } => ErrorCode::InvalidNode,
            PlanError::NoPath { .. } => ErrorCode::NoPath,
            PlanError::Timeout(_) => ErrorCode::Timeout,
        };
        Self::new(code, err.to_string())
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        let code = match &err {
            GraphError::NotFound(_) => ErrorCode::NotFound,
            GraphError::InvalidWeight { .. } => ErrorCode::InvalidWeight,
            GraphError::PoisonedLock(_) => ErrorCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let code = match &err {
            IngestError::UnknownLocation(_) => ErrorCode::UnknownLocation,
            IngestError::InvalidConfidence(_) => ErrorCode::InvalidRequest,
        };
        Self::new(code, err.to_string())
    }
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<AlertError> for ApiError {
    fn from(err: AlertError) -> Self {
        let code = match &err {
            AlertError::NotFound(_) => ErrorCode::NotFound,
            AlertError::AlreadyClosed { .. } => ErrorCode::Conflict,
        };
        Self::new(code, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("Background computation failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use drivemind_graph::{NodeId, SegmentId};
    use std::time::Duration;

    #[test]
    fn maps_domain_errors_to_codes() {
        let cases = [
            (ApiError::from(PlanError::InvalidNode(NodeId::new(9))), StatusCode::BAD_REQUEST),
            (
                ApiError::from(PlanError::NoPath {
                    origin: NodeId::new(1),
                    destination: NodeId::new(7),
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(PlanError::Timeout(Duration::from_secs(2))),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ApiError::from(GraphError::InvalidWeight {
                    segment: SegmentId::new(1),
                    multiplier: -1.0,
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(IngestError::UnknownLocation(drivemind_graph::Location::Node(
                    NodeId::new(99),
                ))),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
