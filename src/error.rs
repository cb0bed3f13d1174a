//! Error types for the mailspool library.

use thiserror::Error;

use crate::job::{JobId, JobState};

/// The main error type for the mailspool library.
#[derive(Error, Debug)]
pub enum SpoolError {
    /// The backing store could not be reached or refused the operation.
    /// Enqueue surfaces this synchronously; no job exists afterwards.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    /// No job with the given id exists in the store.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// A state transition was requested on a job that is not in the
    /// state the transition requires.
    #[error("Invalid job state for {id}: expected {expected}, found {actual}")]
    InvalidState {
        id: JobId,
        expected: JobState,
        actual: JobState,
    },

    /// Caller payload was rejected before a job was created.
    #[error("Validation error: {0}")]
    Validation(String),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using SpoolError.
pub type Result<T> = std::result::Result<T, SpoolError>;
