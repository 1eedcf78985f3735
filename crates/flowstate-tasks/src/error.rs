//! Task invocation error types.

use thiserror::Error;

/// Errors raised by task invocation.
#[derive(Debug, Error)]
pub enum TaskError {
    /// No handler registered for the resource.
    #[error("No handler for resource: {0}")]
    NotFound(String),

    /// The external action failed.
    #[error("Task failed: {0}")]
    Failed(String),

    /// The external action exceeded its deadline.
    #[error("Task timed out after {0} seconds")]
    Timeout(u64),

    /// The parameter document was malformed for this handler.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
}

impl TaskError {
    /// Catchable error code, matched against `ErrorEquals` patterns in a
    /// state's `Catch` list.
    pub fn code(&self) -> &'static str {
        match self {
            TaskError::Timeout(_) => "States.Timeout",
            _ => "States.TaskFailed",
        }
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        TaskError::Json(e.to_string())
    }
}

impl From<reqwest::Error> for TaskError {
    fn from(e: reqwest::Error) -> Self {
        TaskError::Http(e.to_string())
    }
}
