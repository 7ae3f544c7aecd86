//! Boundary to the remote job service.
//!
//! The controller never builds request bodies or handles credentials itself;
//! hosts implement [`RemoteJobApi`] with whatever transport and auth the
//! target service needs.

use crate::error::Result;
use crate::status::{JobHandle, TaskStatus};
use async_trait::async_trait;
use serde_json::Value;

/// The two operations the controller consumes from the remote service.
#[async_trait]
pub trait RemoteJobApi: Send + Sync {
    /// Submit a job and return its handle. Errors are fatal: the controller
    /// surfaces them as [`WaitpointError::SubmissionFailed`] and never
    /// retries the submission.
    ///
    /// [`WaitpointError::SubmissionFailed`]: crate::error::WaitpointError::SubmissionFailed
    async fn submit(&self, params: Value) -> Result<JobHandle>;

    /// One status round trip for a submitted job. Errors are treated as
    /// retryable by the active poller, up to its attempt and duration caps.
    async fn fetch_status(&self, handle: &JobHandle) -> Result<TaskStatus>;
}
