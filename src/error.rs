//! Error types for the waitpoint crate

use crate::status::JobHandle;
use serde_json::Value;

/// Main error type for waitpoint operations
#[derive(Debug, thiserror::Error)]
pub enum WaitpointError {
    /// The remote service rejected the job submission. Fatal; the controller
    /// never retries a submission.
    #[error("Job submission failed: {0}")]
    SubmissionFailed(String),

    /// A status fetch failed with a network or server error. Retried by the
    /// poller up to its attempt and duration caps; surfaces only when the
    /// final allowed attempt fails.
    #[error("Transient status fetch error: {0}")]
    TransientFetch(String),

    /// The remote task reached the FAILED phase. Carries whatever diagnostic
    /// payload the remote side attached.
    #[error("Remote task failed: {handle}")]
    RemoteTaskFailed { handle: JobHandle, detail: Value },

    /// The poll budget or a hard deadline was exhausted
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The wait was cancelled by the caller
    #[error("Wait cancelled")]
    Cancelled,

    /// An inbound signal could not be matched to any suspended execution.
    /// A normal outcome for stale, duplicate, or forged calls; reported to
    /// the inbound caller only, never to a suspended job.
    #[error("No matching suspension for '{0}'")]
    NoMatchingSuspension(String),

    /// The suspension record could not be persisted. The submission fails
    /// rather than falling back to an in-process wait that a restart would
    /// lose.
    #[error("Suspension persistence failed: {0}")]
    PersistenceFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for waitpoint operations
pub type Result<T> = std::result::Result<T, WaitpointError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = WaitpointError::SubmissionFailed("quota exceeded".to_string());
        assert_eq!(err.to_string(), "Job submission failed: quota exceeded");

        let err = WaitpointError::Cancelled;
        assert_eq!(err.to_string(), "Wait cancelled");

        let err = WaitpointError::RemoteTaskFailed {
            handle: JobHandle::new("task-9"),
            detail: json!({"reason": "codec"}),
        };
        assert_eq!(err.to_string(), "Remote task failed: task-9");
    }

    #[test]
    fn test_error_from_serde_json() {
        let result: std::result::Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("not json");
        let err: WaitpointError = result.unwrap_err().into();
        assert!(matches!(err, WaitpointError::Serialization(_)));
    }

    #[test]
    fn test_result_type() {
        fn returns_ok() -> Result<u32> {
            Ok(7)
        }
        assert_eq!(returns_ok().unwrap(), 7);
    }
}
