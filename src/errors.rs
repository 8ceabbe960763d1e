use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{error::DbErr, SqlErr};
use serde::{Deserialize, Serialize};

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Category {0} cannot be its own parent")]
    SelfParent(i32),

    #[error("Category {category_id} cannot be moved under {parent_id}: {parent_id} is one of its descendants")]
    CircularReference { category_id: i32, parent_id: i32 },

    #[error("Category {0} has subcategories; move or delete them first")]
    HasSubcategories(i32),

    #[error("Category {0} still has listings; reassign or delete them first")]
    HasListings(i32),

    #[error("Category hierarchy is corrupt: cycle detected at category {0}")]
    CorruptHierarchy(i32),
}

impl ServiceError {
    /// Maps a unique-index violation raised by a write to `Conflict`; other
    /// database errors pass through unchanged.
    pub fn conflict_on_unique_violation(err: DbErr, message: impl FnOnce() -> String) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(message()),
            _ => ServiceError::DatabaseError(err),
        }
    }

    /// Shorthand for a missing category on a mutating path.
    pub fn category_not_found(id: i32) -> Self {
        ServiceError::NotFound(format!("Category {} not found", id))
    }

    /// Shorthand for a missing listing.
    pub fn listing_not_found(id: i32) -> Self {
        ServiceError::NotFound(format!("Listing {} not found", id))
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::SelfParent(_)
            | Self::CircularReference { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::HasSubcategories(_) | Self::HasListings(_) => {
                StatusCode::CONFLICT
            }
            Self::DatabaseError(_) | Self::CorruptHierarchy(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::CorruptHierarchy(_) => "Category hierarchy is inconsistent".to_string(),
            // user-actionable
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed with internal error");
        }
        let error_message = self.response_message();

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: error_message,
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

/// API Error type for HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        error_code: Option<String>,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Delegate to ServiceError's unified status/message mapping
            ApiError::ServiceError(service_error) => return service_error.into_response(),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadRequest { message, .. } => (StatusCode::BAD_REQUEST, message),
        };

        let error_response = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            message: error_message,
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::category_not_found(7).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.message, "Not found: Category 7 not found");
    }

    #[tokio::test]
    async fn api_error_delegates_to_service_error() {
        let response = ApiError::ServiceError(ServiceError::HasSubcategories(3)).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.error, "Conflict");
        assert!(payload.message.contains("subcategories"));
    }

    #[test]
    fn hierarchy_errors_map_to_client_statuses() {
        assert_eq!(
            ServiceError::SelfParent(1).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::CircularReference {
                category_id: 1,
                parent_id: 2
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::HasSubcategories(1).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::HasListings(1).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn non_unique_database_errors_stay_internal() {
        let err = ServiceError::conflict_on_unique_violation(
            DbErr::Custom("disk I/O error".into()),
            || "unused".to_string(),
        );
        assert!(matches!(err, ServiceError::DatabaseError(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn corrupt_hierarchy_is_an_internal_fault() {
        let err = ServiceError::CorruptHierarchy(4);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.response_message(), "Category hierarchy is inconsistent");
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("connection refused at 10.0.0.5".into()))
                .response_message(),
            "Database error"
        );

        assert_eq!(
            ServiceError::SelfParent(5).response_message(),
            "Category 5 cannot be its own parent"
        );
        assert_eq!(
            ServiceError::CircularReference {
                category_id: 1,
                parent_id: 3
            }
            .response_message(),
            "Category 1 cannot be moved under 3: 3 is one of its descendants"
        );
    }
}
