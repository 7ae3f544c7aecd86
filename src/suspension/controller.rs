//! The suspension controller: the state machine that owns a wait from
//! submission to terminal outcome.
//!
//! The controller decides how the caller learns of completion (active
//! polling vs. passive callback vs. plain timer), how long to wait, and
//! whether the wait stays in process or is durably suspended through the
//! host's [`SuspensionStore`].

use crate::config::{ControllerConfig, WaitConfig};
use crate::correlation::CorrelationDescriptor;
use crate::error::{Result, WaitpointError};
use crate::poller::ActivePoller;
use crate::remote::RemoteJobApi;
use crate::result::CompletionResult;
use crate::router::{InboundSignal, SignalRouter, WaitRegistration};
use crate::status::{JobHandle, TaskStatus};
use crate::suspension::record::{SuspensionRecord, SuspensionState, WakePolicy};
use crate::suspension::store::{InMemorySuspensionStore, SuspensionStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Time-based wait target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerWait {
    /// Resume after a fixed delay
    Delay(Duration),
    /// Resume at a specific wall-clock instant
    Until(DateTime<Utc>),
}

/// How the caller learns of completion. Selected once at submission and
/// switched on exactly once per job; the modes are mutually exclusive, so a
/// polled job never also listens for signals and vice versa.
#[derive(Debug, Clone)]
pub enum WaitMode {
    /// Actively poll the status endpoint until a terminal phase
    Poll,
    /// Suspend until an inbound call reaches the resume address. A blank or
    /// absent address falls back to a generated one.
    Callback { resume_address: Option<String> },
    /// Suspend until an inbound call reaches a freshly generated resume
    /// address
    CallbackGenerated,
    /// Pure time-based wait
    Timer(TimerWait),
}

struct ActiveWait {
    record_id: Uuid,
    cancel: CancellationToken,
    routing_key: Option<String>,
    resume_address: Option<String>,
}

enum SignalWaitOutcome {
    Signal {
        signal: InboundSignal,
        result_tx: Option<oneshot::Sender<CompletionResult>>,
    },
    DeadlineElapsed,
    Cancelled,
}

/// Builder for [`SuspensionController`]
pub struct SuspensionControllerBuilder {
    api: Option<Arc<dyn RemoteJobApi>>,
    store: Option<Arc<dyn SuspensionStore>>,
    router: Option<Arc<SignalRouter>>,
    config: ControllerConfig,
}

impl Default for SuspensionControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SuspensionControllerBuilder {
    pub fn new() -> Self {
        Self {
            api: None,
            store: None,
            router: None,
            config: ControllerConfig::default(),
        }
    }

    /// Set the remote job API (required)
    pub fn remote_api(mut self, api: Arc<dyn RemoteJobApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Set the durable suspension store. Defaults to
    /// [`InMemorySuspensionStore`].
    pub fn store(mut self, store: Arc<dyn SuspensionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the signal router. Defaults to a fresh router owned by this
    /// controller.
    pub fn router(mut self, router: Arc<SignalRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Set the environment-supplied base address for generated resume URLs
    pub fn callback_base_url(mut self, base: impl Into<String>) -> Self {
        self.config.callback_base_url = base.into();
        self
    }

    /// Override the inline wait threshold
    pub fn inline_wait_threshold(mut self, threshold: Duration) -> Self {
        self.config.inline_wait_threshold = threshold;
        self
    }

    /// Replace the whole controller configuration
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<SuspensionController> {
        let api = self.api.ok_or_else(|| {
            WaitpointError::InvalidConfiguration("a remote job API is required".to_string())
        })?;
        Ok(SuspensionController {
            api,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemorySuspensionStore::new())),
            router: self.router.unwrap_or_else(|| Arc::new(SignalRouter::new())),
            config: self.config,
            active: Mutex::new(HashMap::new()),
        })
    }
}

/// Owns the suspend/resume lifecycle of caller-issued jobs. Many jobs may
/// be suspended concurrently; each owns its own timer and registration, and
/// at most one logical thread of control advances a given record.
pub struct SuspensionController {
    api: Arc<dyn RemoteJobApi>,
    store: Arc<dyn SuspensionStore>,
    router: Arc<SignalRouter>,
    config: ControllerConfig,
    active: Mutex<HashMap<JobHandle, ActiveWait>>,
}

impl SuspensionController {
    pub fn builder() -> SuspensionControllerBuilder {
        SuspensionControllerBuilder::new()
    }

    /// The router the host's inbound transport should hand calls to
    pub fn router(&self) -> Arc<SignalRouter> {
        self.router.clone()
    }

    /// Submit a job and await its completion per the chosen wait mode.
    ///
    /// Submission errors are fatal; the controller never retries a
    /// submission.
    pub async fn submit_and_await(
        &self,
        params: Value,
        mode: WaitMode,
        wait: WaitConfig,
    ) -> Result<CompletionResult> {
        let handle = match self.api.submit(params).await {
            Ok(handle) => handle,
            Err(WaitpointError::SubmissionFailed(message)) => {
                return Err(WaitpointError::SubmissionFailed(message))
            }
            Err(e) => return Err(WaitpointError::SubmissionFailed(e.to_string())),
        };
        info!(handle = %handle, "job submitted");
        self.await_completion(handle, mode, wait).await
    }

    /// Await completion of an already-submitted job
    pub async fn await_completion(
        &self,
        handle: JobHandle,
        mode: WaitMode,
        wait: WaitConfig,
    ) -> Result<CompletionResult> {
        let result = match mode {
            WaitMode::Poll => self.poll_wait(handle, wait).await,
            WaitMode::Timer(timer) => self.timer_wait(handle, timer).await,
            WaitMode::Callback { resume_address } => {
                self.signal_wait(handle, resume_address, wait).await
            }
            WaitMode::CallbackGenerated => self.signal_wait(handle, None, wait).await,
        }?;
        info!(handle = %result.handle, outcome = ?result.outcome, "wait completed");
        Ok(result)
    }

    /// One status round trip without waiting: the remote's current view of
    /// the task
    pub async fn check_status(&self, handle: &JobHandle) -> Result<TaskStatus> {
        self.api.fetch_status(handle).await
    }

    /// Cancel an in-flight wait. Idempotent under concurrent attempts:
    /// exactly one caller observes `true`. Drops the pending timer and
    /// deregisters the correlation key, if any, so late-arriving calls are
    /// rejected cleanly.
    pub fn cancel(&self, handle: &JobHandle) -> bool {
        let entry = self.active.lock().remove(handle);
        match entry {
            None => false,
            Some(wait) => {
                if let Some(key) = &wait.routing_key {
                    self.router.deregister(key);
                }
                wait.cancel.cancel();
                info!(handle = %handle, record_id = %wait.record_id, "wait cancelled");
                true
            }
        }
    }

    /// The resume address of an in-flight signal wait: the URL an external
    /// party must call to resume the job. `None` once the wait has
    /// terminated or for non-signal waits.
    pub fn resume_address_for(&self, handle: &JobHandle) -> Option<String> {
        self.active
            .lock()
            .get(handle)
            .and_then(|wait| wait.resume_address.clone())
    }

    /// Resume a durably suspended wait after a process restart, using only
    /// the persisted record: timer waits re-arm the remaining sleep, signal
    /// waits re-register their correlation key and remaining deadline.
    pub async fn resume_after_restart(&self, record_id: Uuid) -> Result<CompletionResult> {
        let record = self.store.load(record_id).await?.ok_or_else(|| {
            WaitpointError::Other(format!("no suspension record {}", record_id))
        })?;
        if record.state.is_terminated() {
            return Err(WaitpointError::Other(format!(
                "suspension record {} is already terminated",
                record_id
            )));
        }
        info!(
            record_id = %record_id,
            handle = %record.handle,
            state = ?record.state,
            "rehydrating suspension record"
        );

        match record.wake_policy {
            WakePolicy::OnSignal => self.listen(record).await,
            _ => {
                let handle = record.handle.clone();
                let remaining = (record.effective_wake_time() - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                let cancel = self.track(&record, None)?;
                let cancelled = Self::sleep_or_cancel(remaining, &cancel).await;
                self.untrack(&handle);
                if cancelled {
                    self.terminate_record(record.id).await;
                    return Ok(CompletionResult::cancelled(handle));
                }
                self.mark_resuming(record.id).await;
                self.terminate_record(record.id).await;
                Ok(CompletionResult::success(handle))
            }
        }
    }

    async fn poll_wait(&self, handle: JobHandle, wait: WaitConfig) -> Result<CompletionResult> {
        let record = SuspensionRecord::new(
            handle.clone(),
            WakePolicy::InlineTimer {
                duration: wait.poll.interval,
            },
        );
        let cancel = self.track(&record, None)?;
        let poller = ActivePoller::new(self.api.as_ref(), wait.poll.clone());
        let polled = poller.poll_until_terminal(&handle, &cancel).await;
        self.untrack(&handle);

        match polled {
            Ok(status) => Ok(CompletionResult::from_status(handle, status)),
            Err(WaitpointError::Cancelled) => Ok(CompletionResult::cancelled(handle)),
            Err(WaitpointError::Timeout(message)) => {
                Ok(CompletionResult::timed_out(handle, message))
            }
            Err(e) => Err(e),
        }
    }

    async fn timer_wait(&self, handle: JobHandle, timer: TimerWait) -> Result<CompletionResult> {
        let now = Utc::now();
        let (wake_at, remaining) = match timer {
            TimerWait::Delay(duration) => {
                let delta = ChronoDuration::from_std(duration).map_err(|e| {
                    WaitpointError::InvalidConfiguration(format!("wait delay too large: {}", e))
                })?;
                (
                    now.checked_add_signed(delta)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                    duration,
                )
            }
            TimerWait::Until(at) => (at, (at - now).to_std().unwrap_or(Duration::ZERO)),
        };

        if remaining < self.config.inline_wait_threshold {
            // Short enough that durable suspension costs more than it saves;
            // the record stays ACTIVE on an in-process timer.
            let record = SuspensionRecord::new(
                handle.clone(),
                WakePolicy::InlineTimer {
                    duration: remaining,
                },
            );
            debug!(handle = %handle, remaining_ms = remaining.as_millis() as u64, "short wait, staying in process");
            let cancel = self.track(&record, None)?;
            let cancelled = Self::sleep_or_cancel(remaining, &cancel).await;
            self.untrack(&handle);
            return Ok(if cancelled {
                CompletionResult::cancelled(handle)
            } else {
                CompletionResult::success(handle)
            });
        }

        let mut record = SuspensionRecord::new(handle.clone(), WakePolicy::WakeAt { at: wake_at });
        record.transition(SuspensionState::TimerSuspended);
        self.persist(&record).await?;
        info!(handle = %handle, record_id = %record.id, wake_at = %wake_at, "durably suspended on timer");

        let cancel = match self.track(&record, None) {
            Ok(cancel) => cancel,
            Err(e) => {
                self.terminate_record(record.id).await;
                return Err(e);
            }
        };
        let cancelled = Self::sleep_or_cancel(remaining, &cancel).await;
        self.untrack(&handle);

        if cancelled {
            self.terminate_record(record.id).await;
            return Ok(CompletionResult::cancelled(handle));
        }
        self.mark_resuming(record.id).await;
        self.terminate_record(record.id).await;
        Ok(CompletionResult::success(handle))
    }

    async fn signal_wait(
        &self,
        handle: JobHandle,
        resume_address: Option<String>,
        wait: WaitConfig,
    ) -> Result<CompletionResult> {
        let descriptor = CorrelationDescriptor::build(
            resume_address.as_deref(),
            &self.config.callback_base_url,
            wait.callback_suffix.as_deref(),
        );
        if descriptor.is_generated() && self.config.callback_base_url.trim().is_empty() {
            return Err(WaitpointError::InvalidConfiguration(
                "callback_base_url is required for generated resume addresses".to_string(),
            ));
        }
        let deadline = wait.deadline.map(|d| d.resolve(Utc::now()));

        let mut record = SuspensionRecord::new(handle, WakePolicy::OnSignal)
            .with_correlation(descriptor)
            .with_deadline(deadline)
            .with_ack(wait.ack);
        record.transition(SuspensionState::EventSuspended);
        self.persist(&record).await?;

        self.listen(record).await
    }

    /// Register the record's correlation key and wait for a signal, the
    /// hard deadline, or cancellation — whichever comes first. The deadline
    /// wins over an indefinite wait.
    async fn listen(&self, record: SuspensionRecord) -> Result<CompletionResult> {
        let descriptor = record.correlation.clone().ok_or_else(|| {
            WaitpointError::Other(format!(
                "suspension record {} has no correlation descriptor",
                record.id
            ))
        })?;
        let key = descriptor.routing_key().to_string();

        let registration = match self.router.register(&key, record.id, record.ack) {
            Ok(registration) => registration,
            Err(e) => {
                self.terminate_record(record.id).await;
                return Err(e);
            }
        };
        let cancel = match self.track(&record, Some(key.clone())) {
            Ok(cancel) => cancel,
            Err(e) => {
                self.router.deregister(&key);
                self.terminate_record(record.id).await;
                return Err(e);
            }
        };
        info!(
            handle = %record.handle,
            record_id = %record.id,
            resume_address = %descriptor.resume_address(),
            "suspended awaiting external signal"
        );

        let waited = Self::await_signal(registration, record.deadline, &cancel).await;
        self.untrack(&record.handle);

        let handle = record.handle.clone();
        match waited {
            SignalWaitOutcome::Signal { signal, result_tx } => {
                self.mark_resuming(record.id).await;
                let result = CompletionResult::from_signal(handle, &signal);
                if let Some(result_tx) = result_tx {
                    // The matched inbound call is held open; answer it with
                    // the final result.
                    let _ = result_tx.send(result.clone());
                }
                self.terminate_record(record.id).await;
                Ok(result)
            }
            SignalWaitOutcome::DeadlineElapsed => {
                self.router.deregister(&key);
                self.terminate_record(record.id).await;
                Ok(CompletionResult::timed_out(
                    handle,
                    "no signal arrived before the hard deadline",
                ))
            }
            SignalWaitOutcome::Cancelled => {
                self.router.deregister(&key);
                self.terminate_record(record.id).await;
                Ok(CompletionResult::cancelled(handle))
            }
        }
    }

    async fn await_signal(
        registration: WaitRegistration,
        deadline: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> SignalWaitOutcome {
        let WaitRegistration {
            mut signal_rx,
            result_tx,
        } = registration;

        let deadline_sleep = async {
            match deadline {
                Some(at) => {
                    let remaining = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                    tokio::time::sleep(remaining).await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline_sleep);

        tokio::select! {
            delivered = &mut signal_rx => match delivered {
                Ok(signal) => SignalWaitOutcome::Signal { signal, result_tx },
                // The registration was removed out from under us; only
                // cancellation does that while we are still listening.
                Err(_) => SignalWaitOutcome::Cancelled,
            },
            _ = cancel.cancelled() => SignalWaitOutcome::Cancelled,
            _ = &mut deadline_sleep => {
                // A signal matched (and acknowledged) in the same instant
                // still wins; an acked signal must not be dropped.
                match signal_rx.try_recv() {
                    Ok(signal) => SignalWaitOutcome::Signal { signal, result_tx },
                    Err(_) => SignalWaitOutcome::DeadlineElapsed,
                }
            }
        }
    }

    /// Track an in-flight wait so it can be cancelled. One wait per job
    /// handle: polling and signal listening are mutually exclusive.
    fn track(
        &self,
        record: &SuspensionRecord,
        routing_key: Option<String>,
    ) -> Result<CancellationToken> {
        let cancel = CancellationToken::new();
        let mut active = self.active.lock();
        if active.contains_key(&record.handle) {
            return Err(WaitpointError::Other(format!(
                "job {} already has an in-flight wait",
                record.handle
            )));
        }
        let resume_address = record
            .correlation
            .as_ref()
            .map(|c| c.resume_address().to_string());
        active.insert(
            record.handle.clone(),
            ActiveWait {
                record_id: record.id,
                cancel: cancel.clone(),
                routing_key,
                resume_address,
            },
        );
        Ok(cancel)
    }

    fn untrack(&self, handle: &JobHandle) {
        self.active.lock().remove(handle);
    }

    async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }

    async fn persist(&self, record: &SuspensionRecord) -> Result<()> {
        self.store.persist(record).await.map_err(|e| match e {
            WaitpointError::PersistenceFailed(message) => {
                WaitpointError::PersistenceFailed(message)
            }
            other => WaitpointError::PersistenceFailed(other.to_string()),
        })
    }

    async fn mark_resuming(&self, record_id: Uuid) {
        if let Err(e) = self
            .store
            .update_state(record_id, SuspensionState::Resuming)
            .await
        {
            warn!(record_id = %record_id, error = %e, "could not record resume transition");
        }
    }

    /// Terminate and destroy a persisted record. Cleanup is unconditional
    /// on every terminal path and never fails the resume itself.
    async fn terminate_record(&self, record_id: Uuid) {
        if let Err(e) = self
            .store
            .update_state(record_id, SuspensionState::Terminated)
            .await
        {
            warn!(record_id = %record_id, error = %e, "could not record terminal transition");
        }
        if let Err(e) = self.store.remove(record_id).await {
            warn!(record_id = %record_id, error = %e, "could not remove suspension record");
        }
    }
}

impl std::fmt::Debug for SuspensionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuspensionController")
            .field("config", &self.config)
            .field("active_waits", &self.active.lock().len())
            .finish()
    }
}
