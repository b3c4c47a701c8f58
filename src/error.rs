//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the HTTP layer. Each
//! variant maps to a specific HTTP status code and structured JSON error
//! response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::IdError;
use crate::store::StoreError;

/// Structured JSON error response body.
///
/// All error responses except version conflicts follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: missing field `eventId`",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see the table on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Body of a `409 Conflict` after the automatic retry was spent.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConflictResponse {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short title.
    pub title: String,
    /// HTTP status, always 409.
    pub status: u16,
    /// Explanation.
    pub detail: String,
    /// Authoritative stored version to re-fetch from.
    pub current_version: u64,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                           |
/// |-----------|-----------------|---------------------------------------|
/// | 1000–1099 | Validation      | 400 Bad Request                       |
/// | 1100–1199 | Access          | 401 Unauthorized / 403 Forbidden      |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict          |
/// | 3000–3999 | Server          | 500 Internal / 503 Service Unavailable |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request body or path failed validation.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No usable caller identity on the request.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Caller may not act on this event. Deliberately carries no reason.
    #[error("forbidden")]
    Forbidden,

    /// The event does not exist.
    #[error("event not found: {0}")]
    EventNotFound(String),

    /// Base version still stale after the automatic retry.
    #[error("layout version is stale; current version is {current_version}")]
    VersionConflict {
        /// Authoritative stored version.
        current_version: u64,
    },

    /// The document store could not be reached.
    #[error("document store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::Unauthenticated(_) => 1101,
            Self::Forbidden => 1102,
            Self::EventNotFound(_) => 2001,
            Self::VersionConflict { .. } => 2002,
            Self::StoreUnavailable(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::EventNotFound(_) => StatusCode::NOT_FOUND,
            Self::VersionConflict { .. } => StatusCode::CONFLICT,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<IdError> for GatewayError {
    fn from(err: IdError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::VersionConflict { current_version } = self {
            let body = ConflictResponse {
                kind: "https://httpstatuses.com/409".to_string(),
                title: "Conflict".to_string(),
                status: status.as_u16(),
                detail: "Layout version is stale.".to_string(),
                current_version,
            };
            return (status, axum::Json(body)).into_response();
        }

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    #[tokio::test]
    async fn conflict_body_carries_current_version() {
        let response = GatewayError::VersionConflict { current_version: 7 }.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body.get("current_version"), Some(&serde_json::json!(7)));
        assert_eq!(body.get("status"), Some(&serde_json::json!(409)));
    }

    #[tokio::test]
    async fn forbidden_body_has_no_reason() {
        let response = GatewayError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({ "error": { "code": 1102, "message": "forbidden" } })
        );
    }

    #[test]
    fn store_errors_map_to_distinct_classes() {
        let unavailable = GatewayError::from(StoreError::Unavailable("down".to_string()));
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let contention = GatewayError::from(StoreError::Contention { attempts: 5 });
        assert_eq!(contention.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn id_errors_are_validation_errors() {
        let err = GatewayError::from(IdError::Empty("event id"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), 1001);
    }
}
