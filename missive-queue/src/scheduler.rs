//! Periodic driver for [`QueueEngine::drain`]

use std::{sync::Arc, time::Duration};

use missive_common::{Signal, internal};
use missive_tracing::traced;
use tokio::{
    sync::{broadcast, watch},
    time::{Instant, MissedTickBehavior},
};

use crate::engine::{CycleReport, DEFAULT_BATCH_LIMIT, QueueEngine};

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(120);

/// How many records a cycle takes, and how often cycles run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    limit: usize,
    interval: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            limit: DEFAULT_BATCH_LIMIT,
            interval: DEFAULT_PERIOD,
        }
    }
}

impl Schedule {
    /// `None` if either the limit or the interval is zero
    #[must_use]
    pub const fn new(limit: usize, interval: Duration) -> Option<Self> {
        if limit == 0 || interval.is_zero() {
            None
        } else {
            Some(Self { limit, interval })
        }
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

/// Reconfigures a running [`QueueScheduler`]
#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    sender: Arc<watch::Sender<Schedule>>,
    default: Schedule,
}

impl ScheduleHandle {
    #[must_use]
    pub fn new(default: Schedule) -> Self {
        Self {
            sender: Arc::new(watch::Sender::new(default)),
            default,
        }
    }

    /// Replace the schedule, restarting the period from now
    ///
    /// A zero limit or interval is ignored; returns whether the schedule changed.
    pub fn configure(&self, limit: usize, interval: Duration) -> bool {
        let Some(schedule) = Schedule::new(limit, interval) else {
            internal!(
                level = WARN,
                limit,
                interval_secs = interval.as_secs(),
                "Ignoring schedule with a zero limit or interval"
            );
            return false;
        };

        self.apply(schedule);
        true
    }

    /// Return to the configured schedule
    pub fn reset_default(&self) -> bool {
        self.apply(self.default);
        true
    }

    pub fn current(&self) -> Schedule {
        *self.sender.borrow()
    }

    pub const fn default_schedule(&self) -> Schedule {
        self.default
    }

    fn apply(&self, schedule: Schedule) {
        internal!(
            level = INFO,
            limit = schedule.limit,
            interval_secs = schedule.interval.as_secs(),
            "Notification schedule set"
        );
        self.sender.send_replace(schedule);
    }

    fn subscribe(&self) -> watch::Receiver<Schedule> {
        self.sender.subscribe()
    }
}

/// Runs a drain cycle every interval until shutdown
#[derive(Debug)]
pub struct QueueScheduler {
    engine: Arc<QueueEngine>,
    handle: ScheduleHandle,
}

impl QueueScheduler {
    pub fn new(engine: Arc<QueueEngine>, schedule: Schedule) -> Self {
        engine.set_limit(schedule.limit);

        Self {
            engine,
            handle: ScheduleHandle::new(schedule),
        }
    }

    pub fn engine(&self) -> &Arc<QueueEngine> {
        &self.engine
    }

    pub fn handle(&self) -> ScheduleHandle {
        self.handle.clone()
    }

    /// See [`ScheduleHandle::configure`]
    pub fn configure(&self, limit: usize, interval: Duration) -> bool {
        self.handle.configure(limit, interval)
    }

    /// Run one cycle now, outside the schedule
    pub async fn drain(&self) -> CycleReport {
        self.engine.drain().await
    }

    /// Drive the engine until a shutdown signal arrives
    ///
    /// The first cycle runs one interval after start. A cycle that is running
    /// when the signal arrives is allowed to finish.
    /// Cycle failures are logged and retried on the next tick.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all))]
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) {
        let mut schedules = self.handle.subscribe();
        let mut schedule = *schedules.borrow_and_update();
        self.engine.set_limit(schedule.limit);

        let mut timer = Self::timer(schedule.interval);

        internal!(
            level = INFO,
            limit = schedule.limit,
            interval_secs = schedule.interval.as_secs(),
            "Notification scheduler starting"
        );

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let report = self.engine.drain().await;
                    internal!(level = DEBUG, ?report, "Scheduled cycle finished");
                }
                Ok(()) = schedules.changed() => {
                    schedule = *schedules.borrow_and_update();
                    self.engine.set_limit(schedule.limit);
                    timer = Self::timer(schedule.interval);
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!(level = INFO, "Notification scheduler received shutdown signal");
                            break;
                        }
                        Err(e) => {
                            internal!(level = ERROR, "Notification scheduler shutdown channel error: {e}");
                            break;
                        }
                    }
                }
            }
        }

        internal!(level = INFO, "Notification scheduler shutdown complete");
    }

    fn timer(interval: Duration) -> tokio::time::Interval {
        let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_schedules_are_rejected() {
        assert!(Schedule::new(0, Duration::from_secs(1)).is_none());
        assert!(Schedule::new(1, Duration::ZERO).is_none());
        assert!(Schedule::new(1, Duration::from_secs(1)).is_some());
    }

    #[test]
    fn test_default_schedule() {
        let schedule = Schedule::default();
        assert_eq!(schedule.limit(), 20);
        assert_eq!(schedule.interval(), Duration::from_secs(120));
    }

    #[test]
    fn test_handle_ignores_zero_interval() {
        let handle = ScheduleHandle::new(Schedule::default());

        assert!(!handle.configure(50, Duration::ZERO));
        assert_eq!(handle.current(), Schedule::default());

        assert!(handle.configure(50, Duration::from_secs(5)));
        assert_eq!(handle.current().limit(), 50);

        assert!(handle.reset_default());
        assert_eq!(handle.current(), handle.default_schedule());
    }
}
