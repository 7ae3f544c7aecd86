//! Test doubles for exercising waits without a live remote service or a
//! durable host.

use crate::error::{Result, WaitpointError};
use crate::remote::RemoteJobApi;
use crate::status::{JobHandle, TaskStatus};
use crate::suspension::record::{SuspensionRecord, SuspensionState};
use crate::suspension::store::SuspensionStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

enum ScriptedFetch {
    Status(TaskStatus),
    Error(String),
}

/// Remote job API that replays a scripted sequence of status responses.
///
/// `submit` returns the configured handle (or a scripted rejection); each
/// `fetch_status` consumes the next scripted entry. An exhausted script
/// keeps reporting PROCESSING so budget-exhaustion paths stay exercisable.
pub struct ScriptedRemoteApi {
    handle: JobHandle,
    submit_failure: Mutex<Option<String>>,
    script: Mutex<VecDeque<ScriptedFetch>>,
    submit_count: AtomicUsize,
    fetch_count: AtomicUsize,
}

impl ScriptedRemoteApi {
    pub fn new(handle: impl Into<JobHandle>) -> Self {
        Self {
            handle: handle.into(),
            submit_failure: Mutex::new(None),
            script: Mutex::new(VecDeque::new()),
            submit_count: AtomicUsize::new(0),
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Queue a status response
    pub fn push_status(&self, status: TaskStatus) {
        self.script.lock().push_back(ScriptedFetch::Status(status));
    }

    /// Queue a transient fetch error
    pub fn push_fetch_error(&self, message: impl Into<String>) {
        self.script
            .lock()
            .push_back(ScriptedFetch::Error(message.into()));
    }

    /// Make the next submission fail
    pub fn fail_submission(&self, message: impl Into<String>) {
        *self.submit_failure.lock() = Some(message.into());
    }

    /// Number of submissions so far
    pub fn submit_count(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }

    /// Number of status fetches so far
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteJobApi for ScriptedRemoteApi {
    async fn submit(&self, _params: Value) -> Result<JobHandle> {
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.submit_failure.lock().take() {
            return Err(WaitpointError::SubmissionFailed(message));
        }
        Ok(self.handle.clone())
    }

    async fn fetch_status(&self, _handle: &JobHandle) -> Result<TaskStatus> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            Some(ScriptedFetch::Status(status)) => Ok(status),
            Some(ScriptedFetch::Error(message)) => Err(WaitpointError::TransientFetch(message)),
            None => Ok(TaskStatus::processing()),
        }
    }
}

/// Store whose `persist` always fails, for exercising the rule that a
/// durable suspend with no persistence fails the submission.
#[derive(Debug, Default)]
pub struct FailingSuspensionStore;

impl FailingSuspensionStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SuspensionStore for FailingSuspensionStore {
    async fn persist(&self, _record: &SuspensionRecord) -> Result<()> {
        Err(WaitpointError::PersistenceFailed(
            "scripted store failure".to_string(),
        ))
    }

    async fn load(&self, _id: Uuid) -> Result<Option<SuspensionRecord>> {
        Ok(None)
    }

    async fn update_state(&self, _id: Uuid, _state: SuspensionState) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _id: Uuid) -> Result<()> {
        Ok(())
    }
}
