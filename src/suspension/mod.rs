//! Suspension lifecycle: the persisted record, the durable persistence
//! boundary, and the controller state machine.

pub mod controller;
pub mod record;
pub mod store;

pub use controller::{SuspensionController, SuspensionControllerBuilder, TimerWait, WaitMode};
pub use record::{indefinite_wake_time, SuspensionRecord, SuspensionState, WakePolicy};
pub use store::{InMemorySuspensionStore, SuspensionStore};
