//! Error types and HTTP response conversion.
//!
//! Every variant maps to the error taxonomy codes used across the HTTP
//! surface: `auth.*` -> 401, `permission.denied` -> 403,
//! `validation.failed` -> 400, `not_found` -> 404, `conflict.version` and
//! `conflict.state` -> 409, `gone.terminal` -> 410, `throttled` -> 429,
//! `dependency.unavailable` -> 503, `internal` -> 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Store operation being performed when a `StoreError` occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Connect,
    Query,
    Insert,
    Update,
    Delete,
    Transaction,
    PoolAcquire,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connect => "connect",
            Self::Query => "query",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Transaction => "transaction",
            Self::PoolAcquire => "pool_acquire",
        };
        write!(f, "{s}")
    }
}

/// Category of store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    ConnectionFailed,
    NotFound,
    ConstraintViolation,
    QueryFailed,
    TransactionFailed,
    TypeConversion,
    Timeout,
    PoolExhausted,
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConnectionFailed => "connection_failed",
            Self::NotFound => "not_found",
            Self::ConstraintViolation => "constraint_violation",
            Self::QueryFailed => "query_failed",
            Self::TransactionFailed => "transaction_failed",
            Self::TypeConversion => "type_conversion",
            Self::Timeout => "timeout",
            Self::PoolExhausted => "pool_exhausted",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Structured store error carrying the operation and error category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub operation: StoreOperation,
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(operation: StoreOperation, kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreOperation::Query, StoreErrorKind::NotFound, message)
    }

    /// Transient errors worth retrying (used by the bounded retry-with-backoff
    /// wrapper around store calls).
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::ConnectionFailed | StoreErrorKind::Timeout | StoreErrorKind::PoolExhausted
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store {} error during {}: {}", self.kind, self.operation, self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::RowNotFound => Self::not_found("row not found"),
            E::PoolTimedOut => Self::new(StoreOperation::PoolAcquire, StoreErrorKind::PoolExhausted, "connection pool timed out"),
            E::PoolClosed => Self::new(StoreOperation::Connect, StoreErrorKind::ConnectionFailed, "connection pool is closed"),
            E::Io(e) => Self::new(StoreOperation::Connect, StoreErrorKind::ConnectionFailed, e.to_string()),
            E::Database(db_err) => {
                let kind = if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation()
                {
                    StoreErrorKind::ConstraintViolation
                } else {
                    StoreErrorKind::QueryFailed
                };
                Self::new(StoreOperation::Query, kind, db_err.to_string())
            }
            other => Self::new(StoreOperation::Query, StoreErrorKind::Other, other.to_string()),
        }
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type, mapped to the HTTP error taxonomy on response.
#[derive(Debug, Error)]
pub enum Error {
    #[error("auth error ({code}): {message}")]
    Auth { code: &'static str, message: String },

    #[error("permission denied: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("version conflict: {0}")]
    ConflictVersion(String),

    #[error("state conflict: {0}")]
    ConflictState(String),

    #[error("resource is in a terminal state: {0}")]
    GoneTerminal(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),

    #[error("{0}")]
    Store(StoreError),

    #[error("redis error: {0}")]
    Redis(Box<redis::RedisError>),

    #[error("jwt error: {0}")]
    Jwt(Box<jsonwebtoken::errors::Error>),

    #[error("http error: {0}")]
    Http(Box<axum::http::Error>),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::Auth { code: "auth.invalid_token", message: message.into() }
    }

    pub fn expired_token(message: impl Into<String>) -> Self {
        Self::Auth { code: "auth.expired_token", message: message.into() }
    }

    pub fn revoked_token(message: impl Into<String>) -> Self {
        Self::Auth { code: "auth.revoked_token", message: message.into() }
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::Auth { code: "auth.invalid_credentials", message: message.into() }
    }

    pub fn locked(message: impl Into<String>) -> Self {
        Self::Auth { code: "auth.locked", message: message.into() }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Auth { code, .. } => code,
            Self::Forbidden(_) => "permission.denied",
            Self::Validation(_) => "validation.failed",
            Self::NotFound(_) => "not_found",
            Self::ConflictVersion(_) => "conflict.version",
            Self::ConflictState(_) => "conflict.state",
            Self::GoneTerminal(_) => "gone.terminal",
            Self::Throttled(_) => "throttled",
            Self::DependencyUnavailable(_) => "dependency.unavailable",
            Self::Internal(_) | Self::Config(_) | Self::Redis(_) | Self::Jwt(_) | Self::Http(_) | Self::Io(_) => "internal",
            Self::Store(e) => match e.kind {
                StoreErrorKind::NotFound => "not_found",
                StoreErrorKind::ConstraintViolation => "conflict.version",
                _ => "dependency.unavailable",
            },
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Auth { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ConflictVersion(_) | Self::ConflictState(_) => StatusCode::CONFLICT,
            Self::GoneTerminal(_) => StatusCode::GONE,
            Self::Throttled(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(e) => match e.kind {
                StoreErrorKind::NotFound => StatusCode::NOT_FOUND,
                StoreErrorKind::ConstraintViolation => StatusCode::CONFLICT,
                _ if e.is_retriable() => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) | Self::Config(_) | Self::Redis(_) | Self::Jwt(_) | Self::Http(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Auth { message, .. }
            | Self::Forbidden(message)
            | Self::Validation(message)
            | Self::NotFound(message)
            | Self::ConflictVersion(message)
            | Self::ConflictState(message)
            | Self::GoneTerminal(message)
            | Self::Throttled(message)
            | Self::DependencyUnavailable(message) => message.clone(),
            Self::Internal(_) | Self::Config(_) | Self::Redis(_) | Self::Jwt(_) | Self::Http(_) | Self::Io(_) => {
                "internal server error".to_string()
            }
            Self::Store(e) => match e.kind {
                StoreErrorKind::NotFound => "resource not found".to_string(),
                StoreErrorKind::ConstraintViolation => "operation conflicts with existing data".to_string(),
                _ => "store operation failed".to_string(),
            },
        }
    }
}

/// Error response body returned for every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub status: u16,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal(msg) => tracing::error!(error = %msg, "internal error"),
            Self::Store(e) => tracing::error!(operation = %e.operation, kind = %e.kind, "store error: {}", e.message),
            Self::Config(e) => tracing::error!(error = %e, "configuration error"),
            Self::Redis(e) => tracing::error!(error = %e, "redis error"),
            Self::Jwt(e) => tracing::warn!(error = %e, "jwt error"),
            Self::Http(e) => tracing::warn!(error = %e, "http error"),
            Self::Io(e) => tracing::error!(error = %e, "i/o error"),
            _ => {}
        }

        let body = ErrorResponse {
            error: self.public_message(),
            code: self.code().to_string(),
            status: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(StoreError::from(err))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Store(err)
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Redis(Box::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::Jwt(Box::new(err))
    }
}

impl From<axum::http::Error> for Error {
    fn from(err: axum::http::Error) -> Self {
        Error::Http(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_401_with_specific_codes() {
        let err = Error::invalid_token("bad signature");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "auth.invalid_token");

        let err = Error::locked("too many attempts");
        assert_eq!(err.code(), "auth.locked");
    }

    #[test]
    fn conflict_variants_map_to_409() {
        assert_eq!(Error::ConflictVersion("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(Error::ConflictState("x".into()).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn gone_terminal_maps_to_410() {
        assert_eq!(Error::GoneTerminal("quest is terminal".into()).status(), StatusCode::GONE);
        assert_eq!(Error::GoneTerminal("x".into()).code(), "gone.terminal");
    }

    #[test]
    fn throttled_maps_to_429() {
        assert_eq!(Error::Throttled("x".into()).status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn store_not_found_maps_to_404() {
        let err: Error = StoreError::not_found("no such row").into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn store_constraint_violation_maps_to_409() {
        let err: Error = StoreError::new(StoreOperation::Insert, StoreErrorKind::ConstraintViolation, "dup").into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
