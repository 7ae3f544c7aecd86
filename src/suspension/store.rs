//! Durable persistence boundary for suspension records.
//!
//! The hosting runtime owns actual storage; the controller only requires
//! that a persisted record can be loaded back after a process restart.

use crate::error::{Result, WaitpointError};
use crate::suspension::record::{SuspensionRecord, SuspensionState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

/// Opaque durable suspend/resume primitive supplied by the host.
#[async_trait]
pub trait SuspensionStore: Send + Sync {
    /// Persist a record before its execution is released. If this fails the
    /// submission fails; the controller never downgrades a durable wait to
    /// an in-process one.
    async fn persist(&self, record: &SuspensionRecord) -> Result<()>;

    /// Load a record by id, or `None` if it was never persisted or already
    /// removed
    async fn load(&self, id: Uuid) -> Result<Option<SuspensionRecord>>;

    /// Record a state transition
    async fn update_state(&self, id: Uuid, state: SuspensionState) -> Result<()>;

    /// Destroy a record once it is TERMINATED
    async fn remove(&self, id: Uuid) -> Result<()>;
}

/// In-memory store for hosts without a durability requirement and for
/// tests. Survives nothing, but exercises the same lifecycle.
#[derive(Debug, Default)]
pub struct InMemorySuspensionStore {
    records: Mutex<HashMap<Uuid, SuspensionRecord>>,
}

impl InMemorySuspensionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Copy of all held records, for inspection in tests
    pub fn snapshot(&self) -> Vec<SuspensionRecord> {
        self.records.lock().values().cloned().collect()
    }
}

#[async_trait]
impl SuspensionStore for InMemorySuspensionStore {
    async fn persist(&self, record: &SuspensionRecord) -> Result<()> {
        self.records.lock().insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<SuspensionRecord>> {
        Ok(self.records.lock().get(&id).cloned())
    }

    async fn update_state(&self, id: Uuid, state: SuspensionState) -> Result<()> {
        let mut records = self.records.lock();
        match records.get_mut(&id) {
            Some(record) => {
                record.state = state;
                Ok(())
            }
            None => Err(WaitpointError::PersistenceFailed(format!(
                "unknown suspension record {}",
                id
            ))),
        }
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        self.records.lock().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::JobHandle;
    use crate::suspension::record::WakePolicy;

    fn record() -> SuspensionRecord {
        SuspensionRecord::new(JobHandle::new("task-1"), WakePolicy::OnSignal)
    }

    #[tokio::test]
    async fn test_persist_load_remove() {
        let store = InMemorySuspensionStore::new();
        let record = record();
        store.persist(&record).await.unwrap();
        assert_eq!(store.len(), 1);

        let loaded = store.load(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.handle, record.handle);

        store.remove(record.id).await.unwrap();
        assert!(store.load(record.id).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_state() {
        let store = InMemorySuspensionStore::new();
        let record = record();
        store.persist(&record).await.unwrap();

        store
            .update_state(record.id, SuspensionState::EventSuspended)
            .await
            .unwrap();
        let loaded = store.load(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.state, SuspensionState::EventSuspended);
    }

    #[tokio::test]
    async fn test_update_state_unknown_record() {
        let store = InMemorySuspensionStore::new();
        let err = store
            .update_state(Uuid::new_v4(), SuspensionState::Resuming)
            .await
            .unwrap_err();
        assert!(matches!(err, WaitpointError::PersistenceFailed(_)));
    }
}
