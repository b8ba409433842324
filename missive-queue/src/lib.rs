//! Notification queue engine and its periodic scheduler
//!
//! This crate provides:
//! - [`QueueEngine`]: validates and persists notifications, then drains them
//!   in bounded batches through a [`Dispatcher`]
//! - [`QueueScheduler`]: runs a drain cycle every interval until shutdown
//! - [`DeliveryControl`]: the delivery switch, discard counter and queue capacity
//! - Mail transports (SMTP, logging, and a recording one for tests)

pub mod clock;
pub mod config;
pub mod control;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod statistics;
pub mod transport;

pub use clock::MonotonicClock;
pub use config::QueueConfig;
pub use control::{CapacityCounter, DeliveryControl};
pub use dispatcher::{Dispatched, Dispatcher};
pub use engine::{CycleReport, OverflowPolicy, QueueEngine, QueueEngineBuilder};
pub use error::{DispatchError, EnqueueError, TransportError};
pub use scheduler::{QueueScheduler, Schedule, ScheduleHandle};
pub use statistics::{PluginCounts, QueueStatistics};
pub use transport::{
    LogTransport, MailTransport, OutboundMessage, RecordingTransport, SmtpConfig, SmtpTransport,
    TransportConfig,
};
