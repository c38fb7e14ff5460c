use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// A single problem found while normalizing an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 1-based row number as shown in a spreadsheet (header is row 1).
    pub row: usize,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    UploadRejected {
        message: String,
        details: Vec<RowError>,
    },

    #[error("E-mail already in use")]
    EmailAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(String),

    #[error("User not found")]
    UserNotFound,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid multipart payload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Bcrypt error: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::ExternalService(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::InternalServerError(e.into())
    }
}

fn database_error_response(e: &sqlx::Error) -> (StatusCode, String) {
    use sqlx::error::ErrorKind;

    match e {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "Record not found.".to_string()),
        sqlx::Error::Database(db_err) => match db_err.kind() {
            ErrorKind::UniqueViolation => (
                StatusCode::CONFLICT,
                "A record with the same unique values already exists.".to_string(),
            ),
            ErrorKind::ForeignKeyViolation => (
                StatusCode::BAD_REQUEST,
                "The record references, or is referenced by, other data.".to_string(),
            ),
            ErrorKind::NotNullViolation | ErrorKind::CheckViolation => (
                StatusCode::BAD_REQUEST,
                format!("Invalid data: {}", db_err.message()),
            ),
            _ => {
                tracing::error!("Database error: {}", db_err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred.".to_string(),
                )
            }
        },
        other => {
            tracing::error!("Database error: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred.".to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "One or more fields are invalid.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::UploadRejected { message, details } => {
                let body = Json(json!({
                    "error": message,
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Multipart(e) => (StatusCode::BAD_REQUEST, format!("Invalid upload: {}", e.body_text())),
            AppError::EmailAlreadyExists => (StatusCode::CONFLICT, "This e-mail is already in use.".to_string()),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid e-mail or password.".to_string()),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Authentication token is invalid or missing.".to_string(),
            ),
            AppError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "User not found.".to_string()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found.", what)),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message),
            AppError::NotConfigured(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{} is not configured on this server.", what),
            ),
            AppError::ExternalService(detail) => {
                tracing::error!("External service failure: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    "An external service failed to respond correctly.".to_string(),
                )
            }
            AppError::DatabaseError(ref e) => database_error_response(e),

            // Everything else is a 500; the detailed message only goes to the log.
            ref e => {
                tracing::error!("Internal server error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{ValidationError, ValidationErrors};

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn maps_client_errors_to_4xx() {
        assert_eq!(status_of(AppError::bad_request("nope")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AppError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::forbidden("no")), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::NotFound("Hotel")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::EmailAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(status_of(AppError::conflict("dup")), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_and_upload_errors_are_bad_requests() {
        let mut errors = ValidationErrors::new();
        errors.add("email", ValidationError::new("email"));
        assert_eq!(status_of(AppError::ValidationError(errors)), StatusCode::BAD_REQUEST);

        let rejected = AppError::UploadRejected {
            message: "bad file".into(),
            details: vec![RowError { row: 2, field: "date".into(), message: "invalid".into() }],
        };
        assert_eq!(status_of(rejected), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unexpected_errors_are_hidden_behind_500() {
        assert_eq!(
            status_of(AppError::InternalServerError(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_of(AppError::DatabaseError(sqlx::Error::PoolTimedOut)), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_of(AppError::DatabaseError(sqlx::Error::RowNotFound)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::ExternalService("down".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(AppError::NotConfigured("Stripe")), StatusCode::SERVICE_UNAVAILABLE);
    }
}
