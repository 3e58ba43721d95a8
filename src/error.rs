//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the account service.
//! Every failure an account operation can produce is one of its variants: field-level
//! validation failures, unique-key collisions, credential failures, cascade failures while
//! deleting an account, and the storage / infrastructure errors underneath them.
//!
//! `AppError` implements `actix_web::error::ResponseError` so route handlers can return it
//! directly. `From` implementations for `sqlx::Error`, `validator::ValidationErrors`,
//! `jsonwebtoken::errors::Error` and `bcrypt::BcryptError` allow the `?` operator throughout.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Why a credential check failed.
///
/// Both reasons are kept apart for logging, but are rendered to clients with
/// the same status and message so the response does not reveal which emails
/// have accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No account exists for the supplied email.
    UserNotFound,
    /// The account exists but the password did not match.
    InvalidCredentials,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthFailure::UserNotFound => write!(f, "user not found"),
            AuthFailure::InvalidCredentials => write!(f, "invalid credentials"),
        }
    }
}

/// Represents all possible errors that can occur within the account service.
#[derive(Debug)]
pub enum AppError {
    /// A declared field constraint was violated (HTTP 422).
    ValidationError { field: String, message: String },
    /// A unique key (the email) collides with an existing record (HTTP 409).
    /// Carries the name of the conflicting field.
    UniquenessError(String),
    /// Credential lookup or verification failed (HTTP 401).
    AuthError(AuthFailure),
    /// Bearer token missing, malformed, badly signed or no longer held by its user (HTTP 401).
    Unauthorized(String),
    /// Owned tasks could not be removed while deleting an account (HTTP 500).
    /// The account itself is left in place.
    CascadeError(String),
    /// Malformed request (HTTP 400).
    BadRequest(String),
    /// Requested resource does not exist (HTTP 404).
    NotFound(String),
    /// Unexpected server-side failure (HTTP 500).
    InternalServerError(String),
    /// Failure reported by the document store (HTTP 500).
    DatabaseError(String),
}

impl AppError {
    /// Shorthand for a `ValidationError` on `field`.
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::ValidationError { field, message } => {
                write!(f, "Validation Error: {}: {}", field, message)
            }
            AppError::UniquenessError(field) => write!(f, "Uniqueness Error: {} already in use", field),
            AppError::AuthError(reason) => write!(f, "Auth Error: {}", reason),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::CascadeError(msg) => write!(f, "Cascade Error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts `AppError` variants into `HttpResponse` objects.
///
/// Storage and cascade failures are reported with a generic message; their details
/// stay in the server log.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UniquenessError(_) => StatusCode::CONFLICT,
            AppError::AuthError(_) | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CascadeError(_)
            | AppError::InternalServerError(_)
            | AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::ValidationError { field, message } => json!({
                "error": message,
                "field": field
            }),
            AppError::UniquenessError(field) => json!({
                "error": format!("{} already in use", field),
                "field": field
            }),
            AppError::AuthError(_) => json!({ "error": "Unable to login" }),
            AppError::Unauthorized(_) => json!({ "error": "Please authenticate" }),
            AppError::BadRequest(msg) | AppError::NotFound(msg) => json!({ "error": msg }),
            AppError::CascadeError(_)
            | AppError::InternalServerError(_)
            | AppError::DatabaseError(_) => json!({ "error": "Internal server error" }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotFound` and a unique-index violation becomes
/// `UniquenessError` on `email`, the only unique column besides the id.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::UniquenessError("email".into())
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`,
/// reporting the first offending field.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        let first = errors
            .field_errors()
            .into_iter()
            .min_by_key(|(field, _)| *field)
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("invalid {}", field));
                (field.to_string(), message)
            });
        match first {
            Some((field, message)) => AppError::ValidationError { field, message },
            None => AppError::ValidationError {
                field: "request".into(),
                message: errors.to_string(),
            },
        }
    }
}

/// Converts `jsonwebtoken::errors::Error` into `AppError::Unauthorized`.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(error.to_string())
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::InternalServerError`.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_error_statuses() {
        assert_eq!(AppError::validation("age", "negative").status_code(), 422);
        assert_eq!(AppError::UniquenessError("email".into()).status_code(), 409);
        assert_eq!(
            AppError::AuthError(AuthFailure::UserNotFound).status_code(),
            401
        );
        assert_eq!(AppError::Unauthorized("Missing token".into()).status_code(), 401);
        assert_eq!(AppError::CascadeError("tasks".into()).status_code(), 500);
        assert_eq!(AppError::BadRequest("bad".into()).status_code(), 400);
        assert_eq!(AppError::NotFound("gone".into()).status_code(), 404);
        assert_eq!(AppError::DatabaseError("down".into()).status_code(), 500);
    }

    #[actix_rt::test]
    async fn test_auth_failures_render_identically() {
        let not_found = AppError::AuthError(AuthFailure::UserNotFound).error_response();
        let bad_password = AppError::AuthError(AuthFailure::InvalidCredentials).error_response();
        assert_eq!(not_found.status(), bad_password.status());

        let a = to_bytes(not_found.into_body()).await.unwrap();
        let b = to_bytes(bad_password.into_body()).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_auth_failure_reason_kept_in_display() {
        let err = AppError::AuthError(AuthFailure::InvalidCredentials);
        assert_eq!(err.to_string(), "Auth Error: invalid credentials");
    }

    #[test]
    fn test_validation_errors_conversion_keeps_field() {
        let mut errors = ValidationErrors::new();
        let mut e = validator::ValidationError::new("email");
        e.message = Some("Invalid Email!".into());
        errors.add("email", e);

        match AppError::from(errors) {
            AppError::ValidationError { field, message } => {
                assert_eq!(field, "email");
                assert_eq!(message, "Invalid Email!");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
