//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-class errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`. Responses are JSON with a machine-readable `error`
//! kind so clients can branch programmatically.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use bookstall_core::BookId;

use crate::db::RepositoryError;
use crate::db::orders::CheckoutError;
use crate::services::auth::AuthError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout was rejected or failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation conflicts with the current state of an entity
    /// (inactive book, empty cart, unavailable payment method).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Requested quantity exceeds live stock. Carries the current stock so
    /// the client can retry with a lower quantity.
    #[error("Insufficient stock for book {book_id}: {available} available")]
    InsufficientStock { book_id: BookId, available: i32 },

    /// Malformed or contradictory request payload.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referential-integrity or uniqueness conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No authenticated identity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body returned to clients.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Stable machine-readable kind.
    error: &'static str,
    /// Human-readable message.
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    book_id: Option<BookId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<i32>,
}

impl ErrorBody {
    fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            book_id: None,
            available: None,
        }
    }
}

impl AppError {
    /// Whether this error class should be captured to Sentry.
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Checkout(CheckoutError::Repository(_))
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::AccountDisabled => StatusCode::FORBIDDEN,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::PaymentMethodUnavailable
                | CheckoutError::BookInactive(_) => StatusCode::BAD_REQUEST,
                CheckoutError::BookNotFound(_) => StatusCode::NOT_FOUND,
                CheckoutError::InsufficientStock { .. } => StatusCode::CONFLICT,
                CheckoutError::Repository(_) | CheckoutError::CodeSpaceExhausted => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientStock { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            // Don't expose internal error details to clients
            Self::Database(_) | Self::Internal(_) => {
                ErrorBody::new("internal", "Internal server error")
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => {
                    ErrorBody::new("unauthorized", "Invalid credentials")
                }
                AuthError::AccountDisabled => {
                    ErrorBody::new("forbidden", "Account is deactivated")
                }
                AuthError::UserAlreadyExists => {
                    ErrorBody::new("conflict", "An account with this email already exists")
                }
                AuthError::WeakPassword(msg) => ErrorBody::new("validation", msg.clone()),
                AuthError::InvalidEmail(e) => ErrorBody::new("validation", e.to_string()),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    ErrorBody::new("internal", "Internal server error")
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => {
                    ErrorBody::new("invalid_state", "Shopping cart is empty")
                }
                CheckoutError::PaymentMethodUnavailable => {
                    ErrorBody::new("invalid_state", "Payment method is not available")
                }
                CheckoutError::BookNotFound(id) => {
                    let mut body = ErrorBody::new("not_found", format!("Book {id} not found"));
                    body.book_id = Some(*id);
                    body
                }
                CheckoutError::BookInactive(id) => {
                    let mut body =
                        ErrorBody::new("invalid_state", format!("Book {id} is not active"));
                    body.book_id = Some(*id);
                    body
                }
                CheckoutError::InsufficientStock { book_id, available } => {
                    let mut body = ErrorBody::new(
                        "insufficient_stock",
                        format!("Not enough stock for book {book_id}: {available} available"),
                    );
                    body.book_id = Some(*book_id);
                    body.available = Some(*available);
                    body
                }
                CheckoutError::Repository(_) | CheckoutError::CodeSpaceExhausted => {
                    ErrorBody::new("internal", "Internal server error")
                }
            },
            Self::NotFound(msg) => ErrorBody::new("not_found", msg.clone()),
            Self::InvalidState(msg) => ErrorBody::new("invalid_state", msg.clone()),
            Self::InsufficientStock { book_id, available } => {
                let mut body = ErrorBody::new(
                    "insufficient_stock",
                    format!("Not enough stock for book {book_id}: {available} available"),
                );
                body.book_id = Some(*book_id);
                body.available = Some(*available);
                body
            }
            Self::Validation(msg) => ErrorBody::new("validation", msg.clone()),
            Self::Conflict(msg) => ErrorBody::new("conflict", msg.clone()),
            Self::Unauthorized(msg) => ErrorBody::new("unauthorized", msg.clone()),
            Self::Forbidden(msg) => ErrorBody::new("forbidden", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 7".to_owned());
        assert_eq!(err.to_string(), "Not found: order 7");

        let err = AppError::InvalidState("book is not active".to_owned());
        assert_eq!(err.to_string(), "Invalid state: book is not active");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("x".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::InvalidState("x".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::InsufficientStock {
                book_id: BookId::new(1),
                available: 0
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Validation("x".to_owned())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Conflict("x".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Unauthorized("x".to_owned())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("x".to_owned())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Internal("x".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_checkout_error_statuses() {
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::BookNotFound(
                BookId::new(9)
            ))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::InsufficientStock {
                book_id: BookId::new(9),
                available: 2
            })),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_insufficient_stock_body_detail() {
        let err = AppError::InsufficientStock {
            book_id: BookId::new(3),
            available: 4,
        };
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"], "insufficient_stock");
        assert_eq!(body["book_id"], 3);
        assert_eq!(body["available"], 4);
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = AppError::Internal("connection pool exhausted at 10.0.0.3".to_owned());
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["message"], "Internal server error");
    }
}
