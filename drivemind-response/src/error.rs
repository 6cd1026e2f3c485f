use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Machine-readable error codes returned to API clients.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidNode,
    UnknownLocation,
    NoPath,
    InvalidWeight,
    NotFound,
    Timeout,
    Unauthorized,
    InvalidRequest,
    Conflict,
    Disabled,
    Internal,
}

impl ErrorCode {
    pub const fn status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidNode | ErrorCode::InvalidWeight | ErrorCode::InvalidRequest => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::UnknownLocation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::NoPath | ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Disabled => StatusCode::FORBIDDEN,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidNode => "INVALID_NODE",
            ErrorCode::UnknownLocation => "UNKNOWN_LOCATION",
            ErrorCode::NoPath => "NO_PATH",
            ErrorCode::InvalidWeight => "INVALID_WEIGHT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Disabled => "DISABLED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The JSON body of every error response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    /// Human-readable description, suitable for display.
    pub message: String,
    pub code: ErrorCode,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_their_wire_names() {
        for code in [
            ErrorCode::InvalidNode,
            ErrorCode::UnknownLocation,
            ErrorCode::NoPath,
            ErrorCode::InvalidWeight,
            ErrorCode::NotFound,
            ErrorCode::Timeout,
            ErrorCode::Unauthorized,
            ErrorCode::InvalidRequest,
            ErrorCode::Conflict,
            ErrorCode::Disabled,
            ErrorCode::Internal,
        ] {
            assert_eq!(
                serde_json::to_value(code).unwrap(),
                serde_json::Value::String(code.as_str().to_string())
            );
        }
    }

    #[test]
    fn status_codes() {
        assert_eq!(ErrorCode::UnknownLocation.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ErrorCode::Timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ErrorCode::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn body_shape() {
        let body = ErrorBody::new(ErrorCode::NoPath, "No route from node/1 to node/7");
        insta::assert_snapshot!(
            serde_json::to_string(&body).unwrap(),
            @r#"{"message":"No route from node/1 to node/7","code":"NO_PATH"}"#
        );
    }
}
