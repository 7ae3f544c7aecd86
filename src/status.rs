//! Remote task status types shared by the poller and the result assembler.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier for a submitted remote task. Opaque to this crate; created at
/// submission time and immutable for the lifetime of the wait.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    /// Wrap a remote-issued task identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle phase the remote service reports for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPhase {
    /// Queued, not yet started
    Pending,
    /// Currently executing
    Processing,
    /// Finished successfully; no further transitions follow
    Success,
    /// Finished with an error; no further transitions follow
    Failed,
}

impl TaskPhase {
    /// Whether this phase is terminal (SUCCESS or FAILED)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskPhase::Success | TaskPhase::Failed)
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPhase::Pending => "PENDING",
            TaskPhase::Processing => "PROCESSING",
            TaskPhase::Success => "SUCCESS",
            TaskPhase::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// One status observation for a submitted task, in the remote wire shape:
/// `{"status": "...", "result": ..., "error": ..., "download_url": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Current lifecycle phase
    #[serde(rename = "status")]
    pub phase: TaskPhase,
    /// Result payload, if the remote attached one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error detail for FAILED tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Reference to a produced artifact (e.g. a download URL)
    #[serde(
        default,
        rename = "download_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub artifact_url: Option<String>,
}

impl TaskStatus {
    /// A bare status with the given phase and no payload
    pub fn with_phase(phase: TaskPhase) -> Self {
        Self {
            phase,
            result: None,
            error: None,
            artifact_url: None,
        }
    }

    /// A PENDING status
    pub fn pending() -> Self {
        Self::with_phase(TaskPhase::Pending)
    }

    /// A PROCESSING status
    pub fn processing() -> Self {
        Self::with_phase(TaskPhase::Processing)
    }

    /// A SUCCESS status carrying a result payload
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::with_phase(TaskPhase::Success)
        }
    }

    /// A FAILED status carrying the remote diagnostic payload
    pub fn failed(error: Value) -> Self {
        Self {
            error: Some(error),
            ..Self::with_phase(TaskPhase::Failed)
        }
    }

    /// Attach an artifact reference
    pub fn with_artifact_url(mut self, url: impl Into<String>) -> Self {
        self.artifact_url = Some(url.into());
        self
    }
}

/// Enforces the monotonic-phase invariant for one job handle: once SUCCESS
/// or FAILED has been observed, no further observation is accepted.
#[derive(Debug, Default)]
pub struct PhaseTracker {
    last: Option<TaskPhase>,
}

impl PhaseTracker {
    /// Create a tracker with no observations yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation. Returns `false` if a terminal phase was already
    /// observed, in which case the new observation must not be acted on.
    pub fn observe(&mut self, phase: TaskPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.last = Some(phase);
        true
    }

    /// Whether a terminal phase has been observed
    pub fn is_terminal(&self) -> bool {
        self.last.map(|p| p.is_terminal()).unwrap_or(false)
    }

    /// The most recent accepted observation
    pub fn last(&self) -> Option<TaskPhase> {
        self.last
    }
}
