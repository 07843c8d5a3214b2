//! Durable sink: fire-and-forget record persistence with a completion barrier
//!
//! `append` hands a batch to the blocking pool and returns immediately. Every
//! returned handle goes into a [`PendingWriteSet`]; `await_all` is the barrier
//! that resolves once every collected write has settled, successfully or not.
//! Write completion order is not guaranteed.

use crate::model::Record;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::RecordCounts;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

type SharedStore = Arc<Mutex<Box<dyn RecordStore>>>;

/// Handle to one scheduled write; resolves when the write settles
#[derive(Debug)]
pub struct WriteHandle(JoinHandle<()>);

impl WriteHandle {
    /// Waits for the write to settle
    pub async fn settled(self) {
        if let Err(e) = self.0.await {
            tracing::warn!("Write task ended abnormally: {}", e);
        }
    }
}

/// In-flight writes of one session
#[derive(Debug, Default)]
pub struct PendingWriteSet {
    handles: Mutex<Vec<WriteHandle>>,
}

impl PendingWriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, handle: WriteHandle) {
        self.lock().push(handle);
    }

    /// Number of handles collected and not yet awaited
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&self) -> Vec<WriteHandle> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WriteHandle>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Persistence front-end shared by the walker and reply tasks
#[derive(Clone)]
pub struct DurableSink {
    store: SharedStore,
}

impl DurableSink {
    pub fn new(store: impl RecordStore + 'static) -> Self {
        Self {
            store: Arc::new(Mutex::new(Box::new(store))),
        }
    }

    /// Schedules a write of `records` without blocking the caller
    ///
    /// A failed write is logged and still counts as settled.
    pub fn append(&self, records: Vec<Record>) -> WriteHandle {
        let store = Arc::clone(&self.store);
        WriteHandle(tokio::task::spawn_blocking(move || {
            let count = records.len();
            let result = lock_store(&store).insert_records(&records);
            match result {
                Ok(()) => tracing::trace!("Persisted {} records", count),
                Err(e) => tracing::warn!("Failed to persist {} records: {}", count, e),
            }
        }))
    }

    /// Completion barrier: resolves once every collected write has settled
    ///
    /// Handles pushed while the barrier is waiting are awaited too.
    pub async fn await_all(pending: &PendingWriteSet) {
        loop {
            let handles = pending.take();
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                handle.settled().await;
            }
        }
    }

    /// Resets the store at the start of a session
    pub async fn clear(&self) -> StorageResult<()> {
        self.with_store(|store| store.clear()).await
    }

    /// Consistent snapshot of every stored record
    ///
    /// Only meaningful after the completion barrier has resolved.
    pub async fn read_all(&self) -> StorageResult<Vec<Record>> {
        self.with_store(|store| store.read_all()).await
    }

    pub async fn counts(&self) -> StorageResult<RecordCounts> {
        self.with_store(|store| store.count_records()).await
    }

    /// Runs a store operation on the blocking pool
    pub async fn with_store<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn RecordStore) -> StorageResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock_store(&store);
            op(&mut **guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn lock_store(store: &SharedStore) -> MutexGuard<'_, Box<dyn RecordStore>> {
    store.lock().unwrap_or_else(|e| e.into_inner())
}
