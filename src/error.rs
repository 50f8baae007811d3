// src/error.rs

//! Unified error handling for the lending service.

use std::fmt;

use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Required input missing or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identifier not present in the catalog, ledger or providers
    #[error("Not found: {0}")]
    NotFound(String),

    /// The item is not part of the organization's inventory
    #[error("ISBN {0} is not in our inventory")]
    NotInInventory(String),

    /// Duplicate registration or concurrent-loan conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No verified identity was supplied
    #[error("Unauthorized: a verified identity is required")]
    Unauthorized,

    /// Provider or store failure after exhausting retries
    #[error("Upstream failure in {context}: {message}")]
    Upstream { context: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation exceeded its time budget
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Coarse classification of an [`AppError`], used by callers that map
/// failures onto a transport (exit codes, HTTP statuses, Lambda payloads).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Upstream,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Configuration => "configuration",
        }
    }

    /// Process exit status for the CLI. 1 is left for usage errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            ErrorKind::Validation => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::Conflict => 4,
            ErrorKind::Unauthorized => 5,
            ErrorKind::Upstream => 6,
            ErrorKind::Configuration => 7,
        }
    }
}

impl AppError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an upstream error with context.
    pub fn upstream(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Upstream {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) | AppError::NotInInventory(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Unauthorized => ErrorKind::Unauthorized,
            AppError::Config(_) => ErrorKind::Configuration,
            AppError::Upstream { .. }
            | AppError::Timeout(_)
            | AppError::Io(_)
            | AppError::Http(_)
            | AppError::Json(_)
            | AppError::Toml(_)
            | AppError::Url(_) => ErrorKind::Upstream,
        }
    }

    /// Convert a transport-level failure into an opaque upstream error,
    /// logging the detail. Domain errors pass through untouched.
    pub fn surface(self, operation: &str, identifier: &str) -> Self {
        match self {
            e @ (AppError::Timeout(_)
            | AppError::Io(_)
            | AppError::Http(_)
            | AppError::Json(_)
            | AppError::Toml(_)
            | AppError::Url(_)) => {
                log::error!("{} failed for {}: {}", operation, identifier, e);
                AppError::upstream(operation, "the backing service is unavailable")
            }
            AppError::Upstream { context, message } => {
                log::error!(
                    "{} failed for {} in {}: {}",
                    operation,
                    identifier,
                    context,
                    message
                );
                AppError::upstream(operation, "the backing service is unavailable")
            }
            other => other,
        }
    }
}
