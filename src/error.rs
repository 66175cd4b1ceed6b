//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    BadValue = 5,
    Duplicate = 6,
    NoCopiesAvailable = 7,
    OverCapacity = 8,
    OutstandingLoans = 9,
    AlreadyApproved = 10,
    NoOutstandingLoan = 11,
    NotAuthenticated = 12,
}

/// Conflicts with the current state of a library, book or request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    #[error("Book with ISBN {isbn} already exists in library {library_id}")]
    DuplicateIsbn { isbn: String, library_id: i32 },

    #[error("A {request_type} request for ISBN {isbn} is already pending")]
    DuplicatePending { isbn: String, request_type: String },

    #[error("No copies of ISBN {isbn} are available")]
    NoCopiesAvailable { isbn: String },

    #[error("All copies of ISBN {isbn} are already on the shelf")]
    OverCapacity { isbn: String },

    #[error("Book {isbn} has {on_loan} copies on loan")]
    OutstandingLoans { isbn: String, on_loan: i32 },

    #[error("Request {0} is already approved")]
    AlreadyApproved(i32),

    #[error("No outstanding loan of ISBN {isbn} to return")]
    NoOutstandingLoan { isbn: String },

    #[error("Email {0} is already registered")]
    DuplicateEmail(String),

    #[error("User {user_id} already belongs to library {library_id}")]
    AlreadyMember { user_id: i32, library_id: i32 },
}

impl Conflict {
    fn code(&self) -> ErrorCode {
        match self {
            Conflict::DuplicateIsbn { .. }
            | Conflict::DuplicatePending { .. }
            | Conflict::DuplicateEmail(_)
            | Conflict::AlreadyMember { .. } => ErrorCode::Duplicate,
            Conflict::NoCopiesAvailable { .. } => ErrorCode::NoCopiesAvailable,
            Conflict::OverCapacity { .. } => ErrorCode::OverCapacity,
            Conflict::OutstandingLoans { .. } => ErrorCode::OutstandingLoans,
            Conflict::AlreadyApproved(_) => ErrorCode::AlreadyApproved,
            Conflict::NoOutstandingLoan { .. } => ErrorCode::NoOutstandingLoan,
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(#[from] Conflict),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Conflict(conflict) => {
                (StatusCode::CONFLICT, conflict.code(), conflict.to_string())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Authorization("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                AppError::Conflict(Conflict::NoCopiesAvailable { isbn: "1".into() }),
                StatusCode::CONFLICT,
            ),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_conflict_codes() {
        assert_eq!(
            Conflict::OverCapacity { isbn: "1".into() }.code(),
            ErrorCode::OverCapacity
        );
        assert_eq!(Conflict::AlreadyApproved(3).code(), ErrorCode::AlreadyApproved);
        assert_eq!(
            Conflict::DuplicateEmail("a@b.c".into()).code(),
            ErrorCode::Duplicate
        );
    }
}
