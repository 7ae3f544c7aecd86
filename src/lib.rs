//! Waitpoint — suspend-and-resume completion controller for long-running
//! remote jobs.
//!
//! A workflow step submits a job that takes minutes to hours and must learn
//! of its completion without blocking a worker thread or losing the wait if
//! the host restarts. This crate owns that lifecycle: it decides how the
//! caller learns of completion (active polling vs. passive callback vs. a
//! plain timer), how long to wait, how suspension is persisted and
//! rehydrated across process boundaries, how an inbound signal is matched
//! to the right suspended execution, and how timeouts, remote failures, and
//! cancellation surface.
//!
//! Everything else — request bodies for specific remote operations,
//! credentials, the inbound HTTP transport, durable storage — stays outside,
//! behind the [`RemoteJobApi`] and [`SuspensionStore`] traits and the
//! [`SignalRouter`] entry point.

pub mod config;
pub mod correlation;
pub mod error;
pub mod poller;
pub mod remote;
pub mod result;
pub mod router;
pub mod status;
pub mod suspension;
pub mod testing;

// Re-export commonly used types
pub use config::{ControllerConfig, DeadlineSpec, PollConfig, WaitConfig, INLINE_WAIT_THRESHOLD};
pub use correlation::CorrelationDescriptor;
pub use error::{Result, WaitpointError};
pub use poller::ActivePoller;
pub use remote::RemoteJobApi;
pub use result::{CompletionResult, Outcome};
pub use router::{AckMode, AckPolicy, Acknowledgment, InboundSignal, SignalRouter};
pub use status::{JobHandle, PhaseTracker, TaskPhase, TaskStatus};
pub use suspension::{
    indefinite_wake_time, InMemorySuspensionStore, SuspensionController,
    SuspensionControllerBuilder, SuspensionRecord, SuspensionState, SuspensionStore, TimerWait,
    WaitMode, WakePolicy,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DeadlineSpec, PollConfig, WaitConfig};
    pub use crate::error::{Result, WaitpointError};
    pub use crate::remote::RemoteJobApi;
    pub use crate::result::{CompletionResult, Outcome};
    pub use crate::router::{AckPolicy, Acknowledgment, InboundSignal, SignalRouter};
    pub use crate::status::{JobHandle, TaskPhase, TaskStatus};
    pub use crate::suspension::{SuspensionController, TimerWait, WaitMode};
}
