use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Result alias used by the repository, service, and handler layers.
pub type AppResult<T> = Result<T, AppError>;

/// AppError
///
/// The single error type crossing component boundaries. Every failure a
/// handler can surface maps onto one of these variants, and the HTTP
/// boundary renders them uniformly as `{"error": "..."}` JSON bodies.
#[derive(Error, Debug)]
pub enum AppError {
    /// Login failed. Deliberately carries no detail about whether the
    /// email or the password was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A uniqueness rule was violated (duplicate user email).
    #[error("{0}")]
    AlreadyExists(&'static str),

    /// The addressed record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The caller is authenticated but not allowed to do this.
    #[error("{0}")]
    Denied(&'static str),

    /// Submitted form data failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Infrastructure failure (database, filesystem). The detail is logged
    /// server-side and never echoed to the client.
    #[error("internal service error: {0}")]
    Internal(String),
}

/// Field-level failures produced while turning a raw submission into a
/// validated record.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} is invalid: {reason}")]
    MalformedField {
        field: &'static str,
        reason: &'static str,
    },

    /// Upload rejected because of its file extension.
    #[error("File type not allowed: {0}")]
    UnsupportedType(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Denied(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(detail) => {
                // Log the fault with full detail, answer with a generic body.
                tracing::error!(%detail, "request failed");
                let body = Json(json!({ "error": "internal server error" }));
                return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("record"),
            other => AppError::Internal(format!("database error: {other}")),
        }
    }
}
