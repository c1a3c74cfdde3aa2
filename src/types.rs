//! Shared error and result types

use hyper::StatusCode;
use thiserror::Error;

/// Errors surfaced by storefront services and handlers.
///
/// Collaborator failures (database, payment, upload, identity) are logged at
/// the call site and mapped to one of these variants; handlers turn them into
/// JSON error responses via [`StorefrontError::status_code`] and
/// [`StorefrontError::code`].
#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorefrontError {
    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Http(_) | Self::Serialization(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "NOT_CONFIGURED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Upstream(_) => "UPSTREAM_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::Http(_) => "BAD_REQUEST",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "INVALID_JSON",
        }
    }
}

impl StorefrontError {
    /// Message safe to show API clients.
    ///
    /// Server-side failures get a fixed message; the detail stays in the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Io(_) => "Internal server error".to_string(),
            Self::Upstream(_) => "Upstream service unavailable".to_string(),
            Self::Timeout(_) => "Upstream service timed out".to_string(),
            Self::Config(_) => "Feature not configured".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
