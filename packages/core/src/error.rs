//! Error types shared by the queue and its tasks.

use std::time::Duration;

/// Message recorded for failures that carry no usable text.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Failure of a single job's work.
///
/// These never escape the queue; they end up as the job's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("{0}")]
    Message(String),

    #[error("Unknown error")]
    Unknown,

    #[error("Task timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Create a failure with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// The text stored on the failed job. Never empty.
    pub fn job_message(&self) -> String {
        match self {
            TaskError::Message(message) if message.trim().is_empty() => UNKNOWN_ERROR.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Parse { key: &'static str, value: String },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
