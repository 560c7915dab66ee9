//! Error responses.
//!
//! Every failure leaves the API as `{"error": <message>, "code": <CODE>}`.
//! Storage details are logged and replaced with a generic message.

use crate::auth::AuthError;
use crate::loans::LoanError;
use crate::store_error::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "authentication required")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// Log `err` and hide it behind a 500.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.message, "code": self.code })),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::not_found(err.to_string()),
            StoreError::Conflict(msg) => ApiError::new(StatusCode::CONFLICT, "CONFLICT", msg),
            StoreError::Validation(msg) => ApiError::bad_request(msg),
            StoreError::Database(e) => ApiError::internal(e),
        }
    }
}

impl From<LoanError> for ApiError {
    fn from(err: LoanError) -> Self {
        let (status, code) = match &err {
            LoanError::LimitExceeded { .. } => (StatusCode::BAD_REQUEST, "LIMIT_EXCEEDED"),
            LoanError::InvalidDuration { .. } => (StatusCode::BAD_REQUEST, "INVALID_DURATION"),
            LoanError::BookNotFound => (StatusCode::NOT_FOUND, "BOOK_NOT_FOUND"),
            LoanError::OutOfStock => (StatusCode::CONFLICT, "OUT_OF_STOCK"),
            LoanError::NotFound => (StatusCode::NOT_FOUND, "LOAN_NOT_FOUND"),
            LoanError::AlreadyReturned => (StatusCode::CONFLICT, "ALREADY_RETURNED"),
            LoanError::Overdue => (StatusCode::CONFLICT, "OVERDUE"),
            LoanError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            LoanError::Storage(e) => return ApiError::internal(e),
        };
        ApiError::new(status, code, err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                ApiError::new(StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", err.to_string())
            }
            AuthError::Unauthenticated => ApiError::unauthorized(),
            AuthError::Forbidden(_) => ApiError::forbidden(err.to_string()),
            AuthError::Store(e) => e.into(),
            AuthError::Hash(_) | AuthError::Database(_) => ApiError::internal(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_error_mapping() {
        let err: ApiError = LoanError::OutOfStock.into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "OUT_OF_STOCK");

        let err: ApiError = LoanError::LimitExceeded { max: 3 }.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "loan limit reached (3 books)");

        let err: ApiError = LoanError::Storage(sqlx::Error::RowNotFound).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn test_store_error_mapping() {
        let err: ApiError = StoreError::NotFound("book").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "book not found");

        let err: ApiError = StoreError::Conflict("taken".into()).into();
        assert_eq!(err.code, "CONFLICT");
    }
}
