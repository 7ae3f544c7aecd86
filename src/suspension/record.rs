//! Persisted state describing one in-flight wait.

use crate::correlation::CorrelationDescriptor;
use crate::router::AckPolicy;
use crate::status::JobHandle;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Far-future wake time standing in for an indefinite signal wait
/// (2099-12-31T23:59:59.999Z).
pub fn indefinite_wake_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(4_102_444_799, 999_000_000).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// State of a suspension record. Mutated only by the controller; TERMINATED
/// is final and non-resumable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspensionState {
    /// Runnable; short waits block in process on a lightweight timer
    Active,
    /// Durably suspended until a wall-clock wake time
    TimerSuspended,
    /// Durably suspended until an external signal (or hard deadline)
    EventSuspended,
    /// A wake or signal arrived; the outcome is being assembled
    Resuming,
    /// Released; any further signal for this record is ignored
    Terminated,
}

impl SuspensionState {
    /// Whether the record is still waiting for a wake or signal
    pub fn is_suspended(&self) -> bool {
        matches!(
            self,
            SuspensionState::TimerSuspended | SuspensionState::EventSuspended
        )
    }

    /// Whether the record has been released
    pub fn is_terminated(&self) -> bool {
        matches!(self, SuspensionState::Terminated)
    }
}

/// How a suspended record gets woken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WakePolicy {
    /// Short wait served by an in-process timer; the record stays ACTIVE
    InlineTimer { duration: Duration },
    /// Durable wake at a wall-clock instant
    WakeAt { at: DateTime<Utc> },
    /// Wait for an external signal; the record's deadline, if any, bounds it
    OnSignal,
}

/// One in-flight suspend operation. Serializable so a host can persist it
/// and the controller can rehydrate after a process restart using only
/// these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspensionRecord {
    pub id: Uuid,
    pub handle: JobHandle,
    /// Present for signal waits
    pub correlation: Option<CorrelationDescriptor>,
    pub wake_policy: WakePolicy,
    pub created_at: DateTime<Utc>,
    /// Hard deadline for signal waits; absent means indefinite
    pub deadline: Option<DateTime<Utc>>,
    pub state: SuspensionState,
    pub ack: AckPolicy,
}

impl SuspensionRecord {
    /// Create an ACTIVE record for a job about to wait
    pub fn new(handle: JobHandle, wake_policy: WakePolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            handle,
            correlation: None,
            wake_policy,
            created_at: Utc::now(),
            deadline: None,
            state: SuspensionState::Active,
            ack: AckPolicy::default(),
        }
    }

    /// Attach the correlation descriptor for a signal wait
    pub fn with_correlation(mut self, correlation: CorrelationDescriptor) -> Self {
        self.correlation = Some(correlation);
        self
    }

    /// Attach a hard deadline
    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Attach the acknowledgment policy
    pub fn with_ack(mut self, ack: AckPolicy) -> Self {
        self.ack = ack;
        self
    }

    /// Move to a new state
    pub fn transition(&mut self, state: SuspensionState) {
        self.state = state;
    }

    /// The wall-clock instant a host-side wake scheduler should use:
    /// the wake time for timer waits, the deadline (or the indefinite
    /// sentinel) for signal waits.
    pub fn effective_wake_time(&self) -> DateTime<Utc> {
        match &self.wake_policy {
            WakePolicy::InlineTimer { duration } => {
                let delta =
                    ChronoDuration::from_std(*duration).unwrap_or_else(|_| ChronoDuration::zero());
                self.created_at
                    .checked_add_signed(delta)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            }
            WakePolicy::WakeAt { at } => *at,
            WakePolicy::OnSignal => self.deadline.unwrap_or_else(indefinite_wake_time),
        }
    }
}
