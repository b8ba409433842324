//! The queue engine: accepts notifications and drains them in batches
//!
//! Producers call [`QueueEngine::enqueue`] concurrently. A single scheduled
//! consumer calls [`QueueEngine::drain`], which runs one cycle:
//!
//! 1. **Load** up to `limit` records newer than the cursor into the batch
//! 2. **Dispatch** each record, collecting the ids of those that left the queue
//! 3. **Remove** exactly those ids from the store and clear the batch
//!
//! Cycles are serialised by one mutex that also guards the cursor and the
//! batch; enqueueing never takes it.

use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use missive_common::{address::validate_address_list, internal};
use missive_spool::{MessageRecord, MessageStore, RecordId, SpoolError};
use missive_tracing::traced;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{
    clock::MonotonicClock, control::CapacityCounter, dispatcher::Dispatcher, error::EnqueueError,
    statistics::QueueStatistics,
};

pub const DEFAULT_BATCH_LIMIT: usize = 20;

/// What a load pass does when it meets a record it cannot take
///
/// A record is refused when it is not newer than the cursor or the batch is
/// already full. A store that honours `load_batch(since, limit)` never hands
/// out such a record, so this only matters for stores that do not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum OverflowPolicy {
    /// Reset the cursor, drop the batch loaded so far and end the pass
    #[default]
    Reset,
    /// End the pass, keeping what was loaded
    DispatchLoaded,
}

/// Outcome of one [`QueueEngine::drain`] cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub loaded: usize,
    /// Records sent or discarded, and so due for removal
    pub dispatched: usize,
    pub failed: usize,
    pub removed: usize,
    /// Cursor after the cycle
    pub cursor: u64,
    pub load_failed: bool,
    pub remove_failed: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    since_time: u64,
    batch: Vec<MessageRecord>,
}

#[derive(Debug)]
pub struct QueueEngine {
    store: Arc<dyn MessageStore>,
    dispatcher: Dispatcher,
    capacity: Arc<dyn CapacityCounter>,
    statistics: Option<Arc<QueueStatistics>>,
    overflow: OverflowPolicy,
    limit: AtomicUsize,
    clock: MonotonicClock,
    state: Mutex<QueueState>,
}

impl QueueEngine {
    #[must_use]
    pub fn builder(
        store: Arc<dyn MessageStore>,
        dispatcher: Dispatcher,
        capacity: Arc<dyn CapacityCounter>,
    ) -> QueueEngineBuilder {
        QueueEngineBuilder {
            store,
            dispatcher,
            capacity,
            statistics: None,
            overflow: OverflowPolicy::default(),
            limit: DEFAULT_BATCH_LIMIT,
        }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn statistics(&self) -> Option<&Arc<QueueStatistics>> {
        self.statistics.as_ref()
    }

    /// Maximum number of records a cycle loads
    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::SeqCst)
    }

    /// Change the batch size; takes effect from the next cycle
    pub fn set_limit(&self, limit: usize) {
        self.limit.store(limit, Ordering::SeqCst);
    }

    /// Creation time of the last record loaded, or 0 after a short pass
    pub async fn cursor(&self) -> u64 {
        self.state.lock().await.since_time
    }

    /// Validate, timestamp and persist a notification
    ///
    /// # Errors
    /// - [`EnqueueError::Validation`] if the recipient list is empty or invalid;
    ///   the store is never touched
    /// - [`EnqueueError::Persistence`] if the store fails; the capacity counter
    ///   is left unchanged
    #[traced(instrument(level = tracing::Level::DEBUG, skip_all, fields(plugin = %record.plugin_id)), timing(precision = "us"))]
    pub async fn try_enqueue(&self, record: MessageRecord) -> Result<RecordId, EnqueueError> {
        validate_address_list(&record.to)?;

        let record = record.created_time(self.clock.now());
        let id = self.store.append(&record).await?;

        self.capacity.increment();
        if let Some(statistics) = &self.statistics {
            statistics.put_queue(&record.plugin_id);
        }

        internal!(
            level = DEBUG,
            plugin = %record.plugin_id,
            to = %record.to,
            %id,
            created_time = record.created_time,
            "Notification queued"
        );

        Ok(id)
    }

    /// [`Self::try_enqueue`], logging failures; `true` if the notification was queued
    pub async fn enqueue(&self, record: MessageRecord) -> bool {
        let plugin = record.plugin_id.clone();
        let to = record.to.clone();

        match self.try_enqueue(record).await {
            Ok(_) => true,
            Err(e @ EnqueueError::Validation(_)) => {
                internal!(level = WARN, %plugin, %to, error = %e, "Rejected notification");
                false
            }
            Err(e @ EnqueueError::Persistence(_)) => {
                internal!(level = ERROR, %plugin, %to, error = %e, "Failed to queue notification");
                false
            }
        }
    }

    /// Run one load → dispatch → remove cycle
    ///
    /// A concurrent caller waits for the running cycle to finish. Failures are
    /// logged and end the affected phase; records that were not removed are
    /// picked up again by a later cycle.
    #[traced(instrument(level = tracing::Level::DEBUG, skip_all), timing(precision = "ms"))]
    pub async fn drain(&self) -> CycleReport {
        let mut state = self.state.lock().await;
        let limit = self.limit();
        let mut report = CycleReport::default();

        match self.load(&mut state, limit).await {
            Ok(loaded) => report.loaded = loaded,
            Err(e) => {
                internal!(level = ERROR, error = %e, "Failed to load queued notifications");
                report.load_failed = true;
            }
        }

        let removal = self.dispatch(&state.batch).await;
        report.dispatched = removal.len();
        report.failed = state.batch.len() - removal.len();

        match self.remove(&removal).await {
            Ok(removed) => report.removed = removed,
            Err(e) => {
                internal!(
                    level = ERROR,
                    error = %e,
                    count = removal.len(),
                    "Failed to remove dispatched notifications"
                );
                report.remove_failed = true;
            }
        }

        state.batch.clear();
        report.cursor = state.since_time;

        if report.loaded > 0 || report.load_failed {
            internal!(
                level = INFO,
                loaded = report.loaded,
                dispatched = report.dispatched,
                failed = report.failed,
                removed = report.removed,
                cursor = report.cursor,
                "Notification cycle complete"
            );
        }

        report
    }

    async fn load(&self, state: &mut QueueState, limit: usize) -> Result<usize, SpoolError> {
        let records = self.store.load_batch(state.since_time, limit).await?;

        for record in records {
            let fresh = state.since_time == 0 || state.since_time < record.created_time;

            if fresh && state.batch.len() < limit {
                state.since_time = record.created_time;
                state.batch.push(record);
                continue;
            }

            internal!(
                level = WARN,
                id = %record.id_display(),
                created_time = record.created_time,
                cursor = state.since_time,
                policy = ?self.overflow,
                "Store returned a record outside the requested window"
            );

            if self.overflow == OverflowPolicy::Reset {
                state.since_time = 0;
                state.batch.clear();
            }
            break;
        }

        let loaded = state.batch.len();
        if loaded < limit {
            state.since_time = 0;
        }

        Ok(loaded)
    }

    /// Ids of the records that left the queue
    async fn dispatch(&self, batch: &[MessageRecord]) -> BTreeSet<RecordId> {
        let mut removal = BTreeSet::new();

        for record in batch {
            if !self.dispatcher.send(record).await {
                continue;
            }

            if let Some(statistics) = &self.statistics {
                statistics.poll_queue(&record.plugin_id);
            }

            match &record.id {
                Some(id) => {
                    removal.insert(id.clone());
                }
                None => internal!(
                    level = WARN,
                    plugin = %record.plugin_id,
                    to = %record.to,
                    "Dispatched a record without an id, it cannot be removed"
                ),
            }
        }

        removal
    }

    /// Always reaches the store, even with nothing to remove
    async fn remove(&self, ids: &BTreeSet<RecordId>) -> Result<usize, SpoolError> {
        let removed = self.store.delete_by_ids(ids).await?;

        for id in &removed {
            self.capacity.decrement();
            internal!(level = DEBUG, %id, "Removed notification");
        }

        if removed.len() < ids.len() {
            internal!(
                level = WARN,
                requested = ids.len(),
                removed = removed.len(),
                "Some dispatched notifications were not removed and may be sent again"
            );
        }

        Ok(removed.len())
    }
}

pub struct QueueEngineBuilder {
    store: Arc<dyn MessageStore>,
    dispatcher: Dispatcher,
    capacity: Arc<dyn CapacityCounter>,
    statistics: Option<Arc<QueueStatistics>>,
    overflow: OverflowPolicy,
    limit: usize,
}

impl QueueEngineBuilder {
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub const fn overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Count per-plugin traffic into `statistics`
    #[must_use]
    pub fn statistics(mut self, statistics: Arc<QueueStatistics>) -> Self {
        self.statistics = Some(statistics);
        self
    }

    #[must_use]
    pub fn build(self) -> QueueEngine {
        QueueEngine {
            store: self.store,
            dispatcher: self.dispatcher,
            capacity: self.capacity,
            statistics: self.statistics,
            overflow: self.overflow,
            limit: AtomicUsize::new(self.limit),
            clock: MonotonicClock::new(),
            state: Mutex::new(QueueState::default()),
        }
    }
}
