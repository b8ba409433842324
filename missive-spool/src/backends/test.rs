use std::{
    collections::BTreeSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::memory::MemoryBackingStore;
use crate::{SpoolError, message::MessageRecord, store::MessageStore, types::RecordId};

#[derive(Debug, Default)]
struct Probe {
    appends: AtomicUsize,
    loads: AtomicUsize,
    deletes: AtomicUsize,
    /// Loads that have not yet been followed by a delete
    open_cycles: AtomicUsize,
    overlaps: AtomicUsize,
    fail_appends: AtomicBool,
    fail_loads: AtomicBool,
    fail_deletes: AtomicBool,
    undeletable: Mutex<BTreeSet<RecordId>>,
    load_delay: Mutex<Option<Duration>>,
}

/// Memory store instrumented for tests
///
/// Besides delegating to a [`MemoryBackingStore`] it can:
/// - wake waiters whenever a record is appended
/// - count calls per operation
/// - detect overlapping load → delete regions, which a serialised consumer
///   must never produce
/// - inject failures (appends, loads, deletes, or deletes of specific ids)
///   and slow loads down
#[derive(Debug, Clone, Default)]
pub struct TestBackingStore {
    pub(crate) inner: MemoryBackingStore,
    notify: Arc<Notify>,
    probe: Arc<Probe>,
}

impl TestBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for a specific number of records to be stored, with timeout
    ///
    /// # Errors
    /// Returns an error if the timeout is reached before the expected count
    pub async fn wait_for_count(&self, expected: usize, timeout: Duration) -> crate::Result<()> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.inner.len() >= expected {
                    return;
                }
                notified.await;
            }
        })
        .await
        .map_err(|e| SpoolError::Internal(format!("Timeout waiting for records: {e}")))
    }

    pub fn record_count(&self) -> usize {
        self.inner.len()
    }

    /// Every stored record, in queue order
    ///
    /// # Errors
    /// If the underlying store cannot be read
    pub async fn records(&self) -> crate::Result<Vec<MessageRecord>> {
        self.inner.load_batch(0, usize::MAX).await
    }

    /// Store an undecodable payload under `created_time`
    ///
    /// # Errors
    /// If the key is already taken
    pub fn inject_corrupt(&self, created_time: u64) -> crate::Result<RecordId> {
        self.inner.insert_payload(created_time, b"\x1f\x8bnot really gzip")
    }

    pub fn append_calls(&self) -> usize {
        self.probe.appends.load(Ordering::SeqCst)
    }

    pub fn load_calls(&self) -> usize {
        self.probe.loads.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.probe.deletes.load(Ordering::SeqCst)
    }

    /// Number of loads that started while another load → delete region was open
    pub fn overlapping_cycles(&self) -> usize {
        self.probe.overlaps.load(Ordering::SeqCst)
    }

    pub fn fail_appends(&self, fail: bool) {
        self.probe.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_loads(&self, fail: bool) {
        self.probe.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.probe.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make removal of `id` fail (and be skipped) until cleared
    ///
    /// # Panics
    /// Panics if the probe mutex is poisoned
    pub fn refuse_delete(&self, id: RecordId) {
        self.probe
            .undeletable
            .lock()
            .expect("TestBackingStore probe mutex poisoned")
            .insert(id);
    }

    /// Delay every load by `delay`, widening the window for races
    ///
    /// # Panics
    /// Panics if the probe mutex is poisoned
    pub fn slow_loads(&self, delay: Duration) {
        *self
            .probe
            .load_delay
            .lock()
            .expect("TestBackingStore probe mutex poisoned") = Some(delay);
    }

    fn unavailable(operation: &str) -> SpoolError {
        SpoolError::Unavailable(format!("injected {operation} failure"))
    }
}

#[async_trait]
impl MessageStore for TestBackingStore {
    async fn append(&self, record: &MessageRecord) -> crate::Result<RecordId> {
        self.probe.appends.fetch_add(1, Ordering::SeqCst);
        if self.probe.fail_appends.load(Ordering::SeqCst) {
            return Err(Self::unavailable("append"));
        }

        let id = self.inner.append(record).await?;
        self.notify.notify_waiters();
        Ok(id)
    }

    async fn load_batch(&self, since_time: u64, limit: usize) -> crate::Result<Vec<MessageRecord>> {
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        if self.probe.open_cycles.fetch_add(1, Ordering::SeqCst) > 0 {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        let delay = *self
            .probe
            .load_delay
            .lock()
            .map_err(|e| SpoolError::Internal(e.to_string()))?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.probe.fail_loads.load(Ordering::SeqCst) {
            return Err(Self::unavailable("load"));
        }

        self.inner.load_batch(since_time, limit).await
    }

    async fn delete_by_ids(&self, ids: &BTreeSet<RecordId>) -> crate::Result<Vec<RecordId>> {
        self.probe.deletes.fetch_add(1, Ordering::SeqCst);
        let _ = self
            .probe
            .open_cycles
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| {
                open.checked_sub(1)
            });

        if self.probe.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("delete"));
        }

        let undeletable = self
            .probe
            .undeletable
            .lock()
            .map_err(|e| SpoolError::Internal(e.to_string()))?
            .clone();
        let permitted: BTreeSet<RecordId> = ids.difference(&undeletable).cloned().collect();

        self.inner.delete_by_ids(&permitted).await
    }

    async fn count(&self) -> crate::Result<usize> {
        self.inner.count().await
    }
}
