//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError};
use event_store::EventStoreError;
use projections::ProjectionError;

/// API-level error type that maps to HTTP responses.
///
/// Every body has the shape `{"error": message, "kind": kind}`.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Malformed request from the client.
    BadRequest(String),
    /// No staff identity on a staff route.
    Unauthorized(String),
    /// Staff identity not on the allow-list.
    Forbidden(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
            }
        };

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, &'static str, String) {
    let (status, kind) = match &err {
        DomainError::Order(order_err) => match order_err {
            OrderError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            OrderError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            OrderError::AlreadyPlaced => (StatusCode::CONFLICT, "already_placed"),
            OrderError::InsufficientStock { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock")
            }
            OrderError::NotFound | OrderError::PaymentNotSubmitted => {
                (StatusCode::NOT_FOUND, "not_found")
            }
        },
        DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => {
            (StatusCode::CONFLICT, "concurrency_conflict")
        }
        DomainError::EventStore(EventStoreError::ProductNotFound(_)) => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        _ => {
            tracing::error!(error = %err, "unhandled domain error");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };
    (status, kind, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<EventStoreError> for ApiError {
    fn from(err: EventStoreError) -> Self {
        ApiError::Domain(err.into())
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
