// src/error.rs
// Standardized error types for memento

use thiserror::Error;

/// Main error type for the memento library
#[derive(Error, Debug)]
pub enum MementoError {
    /// Transport failure to the graph store, LLM, or embedding provider.
    #[error("connection error: {0}")]
    Connection(String),

    /// Deadlock, lock contention, or other condition expected to clear.
    #[error("transient error: {0}")]
    Transient(String),

    /// Schema invariant rejected by the store. Not retryable.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Index or constraint already present. Benign during setup only.
    #[error("schema already exists: {0}")]
    SchemaAlreadyExists(String),

    /// Malformed query or unclassified store failure.
    #[error("query error: {0}")]
    Query(String),

    /// LLM output did not match the expected shape.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// Embedding requested for empty or whitespace-only text.
    #[error("empty input: embedding requested for empty text")]
    EmptyInput,

    /// Deadline hit before the operation completed.
    #[error("timeout exceeded")]
    TimeoutExceeded,

    /// Every retrieval source failed.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Result using MementoError
pub type Result<T> = std::result::Result<T, MementoError>;

impl MementoError {
    /// Classify an HTTP failure status into a retryable or terminal error.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status.is_server_error() || status.as_u16() == 429 {
            MementoError::Transient(format!("API error {status}: {body}"))
        } else {
            MementoError::Query(format!("API error {status}: {body}"))
        }
    }

    /// Whether the operation may succeed on retry.
    ///
    /// Connection failures retry immediately; transient store conditions and
    /// LLM shape violations retry with backoff. Everything else surfaces.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MementoError::Connection(_)
                | MementoError::Transient(_)
                | MementoError::SchemaViolation(_)
        )
    }
}

impl From<reqwest::Error> for MementoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MementoError::TimeoutExceeded
        } else if err.is_connect() {
            MementoError::Connection(err.to_string())
        } else {
            MementoError::Transient(err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for MementoError {
    fn from(err: tokio::task::JoinError) -> Self {
        MementoError::Transient(err.to_string())
    }
}
