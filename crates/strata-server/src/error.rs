//! Error handling for the REST API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use strata_core::error::StrataError;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    // Common error constructors
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

// Convert from strata-core errors
impl From<StrataError> for ApiError {
    fn from(err: StrataError) -> Self {
        let status = match &err {
            StrataError::CapacityExceeded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            StrataError::NotFound { .. } => StatusCode::NOT_FOUND,
            StrataError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            StrataError::DecayInProgress { .. } => StatusCode::CONFLICT,
            StrataError::Configuration(_) | StrataError::UnsupportedProvider { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut api = ApiError::new(status, err.code().as_str(), err.to_string());
        if let StrataError::CapacityExceeded { stage, capacity, .. } = &err {
            api = api.with_details(serde_json::json!({ "stage": stage, "capacity": capacity }));
        }
        if let Some(suggestion) = err.suggestion() {
            let mut details = api.details.take().unwrap_or_else(|| serde_json::json!({}));
            details["suggestion"] = serde_json::Value::String(suggestion.to_string());
            api.details = Some(details);
        }
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "Request failed");
        }
        api
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err: ApiError = StrataError::capacity_exceeded("fresh", 100).into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, "CAP_001");
        assert_eq!(err.details.as_ref().unwrap()["capacity"], 100);

        let err: ApiError = StrataError::not_found("item abc").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: ApiError = StrataError::validation("empty content").into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = StrataError::decay_in_progress().into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: ApiError = StrataError::internal("boom").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
