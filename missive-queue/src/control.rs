//! Administrative view of the notification queue
//!
//! [`DeliveryControl`] is shared between the engine, the dispatcher and
//! whatever operator surface the host application exposes. It holds:
//! - the delivery switch: while delivery is off, queued records are consumed
//!   without reaching the mail transport and only counted
//! - the number of records discarded that way
//! - the number of records currently queued
//! - the active batch schedule, once a scheduler registers itself

use std::{
    fmt::Debug,
    sync::{
        OnceLock,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use missive_common::internal;

use crate::scheduler::{Schedule, ScheduleHandle};

/// Tracks how many records are waiting in the queue
pub trait CapacityCounter: Send + Sync + Debug {
    /// A record was accepted into the queue
    fn increment(&self);

    /// A record was removed from the queue
    fn decrement(&self);
}

#[derive(Debug)]
pub struct DeliveryControl {
    enabled: AtomicBool,
    discarded: AtomicU64,
    capacity: AtomicUsize,
    schedule: OnceLock<ScheduleHandle>,
}

impl Default for DeliveryControl {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DeliveryControl {
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            discarded: AtomicU64::new(0),
            capacity: AtomicUsize::new(0),
            schedule: OnceLock::new(),
        }
    }

    /// Whether queued records are handed to the mail transport
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            internal!(
                level = INFO,
                "Notification delivery switched {}",
                if enabled { "on" } else { "off" }
            );
        }
    }

    /// Count a record consumed while delivery was switched off
    pub fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::SeqCst)
    }

    /// Reset the discard counter, returning its previous value
    pub fn reset_discarded(&self) -> u64 {
        self.discarded.swap(0, Ordering::SeqCst)
    }

    /// Number of records currently queued
    pub fn current_capacity(&self) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    /// Seed the capacity, e.g. with the number of records already spooled at startup
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::SeqCst);
    }

    /// Attach the scheduler whose schedule this view reports and resets
    ///
    /// Only the first registration takes effect; returns whether this one did.
    pub fn register_schedule(&self, handle: ScheduleHandle) -> bool {
        self.schedule.set(handle).is_ok()
    }

    /// The schedule currently in force, if a scheduler is registered
    pub fn schedule(&self) -> Option<Schedule> {
        self.schedule.get().map(ScheduleHandle::current)
    }

    /// Mails sent per cycle under the current schedule
    pub fn mails_per_send(&self) -> Option<usize> {
        self.schedule().map(|schedule| schedule.limit())
    }

    /// Seconds between cycles under the current schedule
    pub fn interval_secs(&self) -> Option<u64> {
        self.schedule().map(|schedule| schedule.interval().as_secs())
    }

    /// Reapply the configured schedule, undoing any runtime reconfiguration
    ///
    /// Returns `false` if no scheduler is registered.
    pub fn reset_default_schedule(&self) -> bool {
        self.schedule
            .get()
            .is_some_and(ScheduleHandle::reset_default)
    }
}

impl CapacityCounter for DeliveryControl {
    fn increment(&self) {
        self.capacity.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        let _ = self
            .capacity
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            });
    }
}
