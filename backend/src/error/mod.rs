//! Request-level errors and the JSON body every failed API call returns.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// `{"error": "...", "code": "...", "details": {...}}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Validation(Vec<String>),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    InternalServerError(anyhow::Error),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::InternalServerError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR")
            }
        }
    }
}

/// Booking rule violations. Everything except `Database` is an expected,
/// user-facing outcome carrying a human-readable reason.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("slot already booked")]
    AlreadyBooked,
    #[error("Maximum allowed bookings used")]
    LimitReached,
    #[error("Expiry outside allowable range")]
    InvalidExpiry,
    #[error("Can only extend within the last {0} days")]
    OutsideExtensionWindow(i32),
    #[error("Maximum number of extensions used")]
    ExtensionLimitReached,
    #[error("Booking has expired")]
    Expired,
    #[error("Cannot extend booking. Slot is now booked by someone else.")]
    SlotUnassigned,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Booking belongs to another user")]
    NotOwner,
    #[error("Booking link expired or invalid.")]
    InvalidCancellationLink,
    #[error("Booking changed while it was being updated, please try again")]
    ConcurrentUpdate,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl BookingError {
    /// Reason suitable for showing to the member.
    pub fn reason(&self) -> String {
        match self {
            BookingError::Database(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_already_booked(&self) -> bool {
        matches!(self, BookingError::AlreadyBooked)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let (message, details) = match self {
            AppError::BadRequest(message)
            | AppError::Forbidden(message)
            | AppError::NotFound(message)
            | AppError::Conflict(message) => (message, None),
            AppError::Validation(errors) => (
                "Validation failed".to_string(),
                Some(json!({ "errors": errors })),
            ),
            AppError::InternalServerError(err) => {
                // The cause stays in the log; the caller only learns the status.
                tracing::error!(error = ?err, "Unhandled error while serving request");
                ("Internal server error".to_string(), None)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            AppError::NotFound("Resource not found".to_string())
        } else {
            AppError::InternalServerError(anyhow::Error::new(err))
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let reason = err.reason();
        match err {
            BookingError::Database(db) => AppError::InternalServerError(anyhow::Error::new(db)),
            BookingError::AlreadyBooked | BookingError::ConcurrentUpdate => {
                AppError::Conflict(reason)
            }
            BookingError::NotOwner | BookingError::InvalidCancellationLink => {
                AppError::Forbidden(reason)
            }
            BookingError::NotFound(_) => AppError::NotFound(reason),
            _ => AppError::BadRequest(reason),
        }
    }
}

/// Flattens field errors into `"field: code"` strings, sorted so the output
/// is stable.
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages = Vec::new();
        for (field, field_errors) in errors.field_errors() {
            messages.extend(
                field_errors
                    .iter()
                    .map(|error| format!("{}: {}", field, error.code)),
            );
        }
        messages.sort();
        AppError::Validation(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn into_parts(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn plain_errors_echo_their_message() {
        let (status, body) = into_parts(AppError::BadRequest("bad".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad");
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body.get("details").is_none());

        let (status, body) = into_parts(AppError::Forbidden("denied".to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn already_booked_is_a_conflict() {
        let (status, body) = into_parts(BookingError::AlreadyBooked.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "slot already booked");
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn rule_violations_are_bad_requests() {
        let (status, body) = into_parts(BookingError::OutsideExtensionWindow(10).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Can only extend within the last 10 days");
    }

    #[tokio::test]
    async fn ownership_and_links_are_forbidden() {
        let (status, _) = into_parts(BookingError::NotOwner.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = into_parts(BookingError::InvalidCancellationLink.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Booking link expired or invalid.");
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let (status, body) = into_parts(BookingError::NotFound("Slot").into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Slot not found");

        let (status, _) = into_parts(sqlx::Error::RowNotFound.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn database_failures_hide_details() {
        let err = BookingError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.reason(), "Internal server error");
        let (status, body) = into_parts(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
    }

    #[tokio::test]
    async fn validation_lists_each_field() {
        let err = AppError::Validation(vec!["description: length".to_string()]);
        let (status, body) = into_parts(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"]["errors"][0], "description: length");
    }
}
