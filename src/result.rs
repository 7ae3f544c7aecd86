//! Completion result assembly: the single convergence point for polling-
//! and signal-sourced completions, so downstream consumers never need to
//! know which mode produced the result.

use crate::error::{Result, WaitpointError};
use crate::router::InboundSignal;
use crate::status::{JobHandle, TaskPhase, TaskStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Terminal outcome of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// The job finished and produced a payload
    Success,
    /// The remote task reached the FAILED phase
    Failed,
    /// Poll budget or hard deadline exhausted before a terminal phase
    TimedOut,
    /// The caller cancelled the wait; a normal terminal outcome, not an error
    Cancelled,
}

/// Normalized completion of one waited-on job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResult {
    pub handle: JobHandle,
    pub outcome: Outcome,
    /// Result payload for successful completions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Diagnostic detail for failed or timed-out completions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Artifact reference the remote attached, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
}

impl CompletionResult {
    /// A successful completion with no payload yet
    pub fn success(handle: JobHandle) -> Self {
        Self {
            handle,
            outcome: Outcome::Success,
            payload: None,
            error: None,
            artifact_url: None,
        }
    }

    /// Attach a result payload
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Normalize a terminal status produced by the active poller.
    ///
    /// A FAILED phase becomes a structured failure carrying the remote
    /// diagnostic payload; it is never re-wrapped into a timeout. A
    /// non-terminal phase (the poller never hands one over) is normalized to
    /// a timeout naming the last known phase.
    pub fn from_status(handle: JobHandle, status: TaskStatus) -> Self {
        match status.phase {
            TaskPhase::Success => Self {
                handle,
                outcome: Outcome::Success,
                payload: status.result,
                error: None,
                artifact_url: status.artifact_url,
            },
            TaskPhase::Failed => Self {
                handle,
                outcome: Outcome::Failed,
                payload: None,
                error: status.error.or(status.result),
                artifact_url: status.artifact_url,
            },
            phase => Self {
                handle,
                outcome: Outcome::TimedOut,
                payload: None,
                error: Some(json!(format!("last known phase: {}", phase))),
                artifact_url: None,
            },
        }
    }

    /// Normalize a matched inbound signal. The payload keeps the shape the
    /// webhook transport saw: `{"body": ..., "headers": ..., "query": ...}`.
    pub fn from_signal(handle: JobHandle, signal: &InboundSignal) -> Self {
        Self {
            handle,
            outcome: Outcome::Success,
            payload: Some(json!({
                "body": signal.body,
                "headers": signal.headers,
                "query": signal.query,
            })),
            error: None,
            artifact_url: None,
        }
    }

    /// A wait that exhausted its poll budget or hard deadline
    pub fn timed_out(handle: JobHandle, detail: impl Into<String>) -> Self {
        Self {
            handle,
            outcome: Outcome::TimedOut,
            payload: None,
            error: Some(Value::String(detail.into())),
            artifact_url: None,
        }
    }

    /// A wait the caller cancelled
    pub fn cancelled(handle: JobHandle) -> Self {
        Self {
            handle,
            outcome: Outcome::Cancelled,
            payload: None,
            error: None,
            artifact_url: None,
        }
    }

    /// Whether the outcome is SUCCESS
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Convert into the error taxonomy: SUCCESS yields its payload, every
    /// other outcome the corresponding typed error.
    pub fn into_result(self) -> Result<Value> {
        match self.outcome {
            Outcome::Success => Ok(self.payload.unwrap_or(Value::Null)),
            Outcome::Failed => Err(WaitpointError::RemoteTaskFailed {
                handle: self.handle,
                detail: self.error.unwrap_or(Value::Null),
            }),
            Outcome::TimedOut => {
                let detail = match &self.error {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => format!("job {} timed out", self.handle),
                };
                Err(WaitpointError::Timeout(detail))
            }
            Outcome::Cancelled => Err(WaitpointError::Cancelled),
        }
    }
}
