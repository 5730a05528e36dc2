//! Error types shared across the workspace.
//!
//! `ApiError` lives here rather than in `gellyfish-client` so that the
//! progress store and the admin actions can match on backend failures
//! without depending on the HTTP client.

use thiserror::Error;

/// Errors that can occur when talking to the hosted backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed (missing or invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The endpoint returned a non-success HTTP status.
    #[error("API error (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    /// The GraphQL response carried an `errors` array.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// A mutation returned a result with `success: false`.
    #[error("{operation} failed: {message}")]
    Mutation { operation: String, message: String },

    /// The response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The record failed model validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("{model} {id} not found")]
    NotFound { model: String, id: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),
}

/// Field-level validation failures, mirroring the hosted model schemas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{model}.{field} is required")]
    Required {
        model: &'static str,
        field: &'static str,
    },

    #[error("{model}.{field} must be at most {max} characters")]
    TooLong {
        model: &'static str,
        field: &'static str,
        max: usize,
    },

    #[error("{model}.{field} must be at least {min}")]
    OutOfRange {
        model: &'static str,
        field: &'static str,
        min: i64,
    },

    #[error("{model}.{field} must be unique, {value} is already taken")]
    NotUnique {
        model: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("{model}.{field} is not a valid URL: {value}")]
    InvalidUrl {
        model: &'static str,
        field: &'static str,
        value: String,
    },
}

/// Errors from a local key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt storage data: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}
