use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

/// Postgres index guarding "one active attempt per (student, quiz)".
pub const ACTIVE_ATTEMPT_INDEX: &str = "quiz_attempts_one_active_idx";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Quiz not found")]
    QuizNotFound,

    #[error("Not enrolled in this course")]
    NotEnrolled,

    #[error("Maximum attempts reached")]
    AttemptLimitReached,

    #[error("An active attempt already exists")]
    AttemptAlreadyActive,

    #[error("No active quiz attempt found")]
    NoActiveAttempt,

    #[error("Attempt has already been submitted")]
    AlreadySubmitted,

    #[error("Attempt time limit has expired")]
    DeadlineExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error classes exposed across the request/response boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Forbidden(_) | Error::NotEnrolled => ErrorKind::Forbidden,
            Error::QuizNotFound | Error::NoActiveAttempt => ErrorKind::NotFound,
            Error::AttemptLimitReached
            | Error::AttemptAlreadyActive
            | Error::AlreadySubmitted
            | Error::DeadlineExceeded => ErrorKind::Conflict,
            Error::InvalidInput(_) | Error::Validation(_) => ErrorKind::InvalidInput,
            Error::Config(_) | Error::Database(_) | Error::Migration(_) | Error::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Stable machine-readable code used in response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            // a caller outside the course must not learn whether the quiz exists
            Error::QuizNotFound | Error::NotEnrolled => "quiz_not_found",
            Error::AttemptLimitReached => "attempt_limit_reached",
            Error::AttemptAlreadyActive => "attempt_already_active",
            Error::NoActiveAttempt => "no_active_attempt",
            Error::AlreadySubmitted => "already_submitted",
            Error::DeadlineExceeded => "deadline_exceeded",
            Error::InvalidInput(_) | Error::Validation(_) => "invalid_input",
            Error::Config(_) | Error::Database(_) | Error::Migration(_) | Error::Internal(_) => {
                "internal_error"
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            Error::NotEnrolled => (StatusCode::NOT_FOUND, Error::QuizNotFound.to_string()),
            Error::Database(err) => {
                tracing::error!(error = ?err, "Database failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".to_string(),
                )
            }
            Error::Config(_) | Error::Migration(_) | Error::Internal(_) => {
                tracing::error!(error = %self, "Internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".to_string(),
                )
            }
            other => (other.kind().status(), other.to_string()),
        };

        let body = Json(json!({ "error": self.code(), "message": message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db)
                if db.constraint() == Some(ACTIVE_ATTEMPT_INDEX) =>
            {
                Error::AttemptAlreadyActive
            }
            other => Error::Database(other),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::InvalidInput(rejection.body_text())
    }
}
