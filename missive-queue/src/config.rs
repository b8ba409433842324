use std::time::Duration;

use missive_common::{env::system_value, internal};
use serde::Deserialize;

use crate::{
    engine::{DEFAULT_BATCH_LIMIT, OverflowPolicy},
    scheduler::{DEFAULT_PERIOD, Schedule},
};

pub const BATCH_LIMIT_OVERRIDE: &str = "MISSIVE_QUEUE_NUMBER_OF_MAIL_PER_BATCH";
pub const PERIOD_OVERRIDE: &str = "MISSIVE_QUEUE_PERIOD";

const fn default_number_of_mail_per_batch() -> usize {
    DEFAULT_BATCH_LIMIT
}

const fn default_period() -> u64 {
    DEFAULT_PERIOD.as_secs()
}

const fn default_transport_timeout() -> u64 {
    30
}

const fn default_enabled() -> bool {
    true
}

/// Queue engine and scheduler settings
///
/// ```ron
/// queue: (
///     number_of_mail_per_batch: 20,
///     period_secs: 120,
///     transport_timeout_secs: 30,
///     overflow: Reset,
///     statistics: false,
///     enabled: true,
/// ),
/// ```
///
/// `number_of_mail_per_batch` and `period_secs` can be overridden by the
/// `MISSIVE_QUEUE_NUMBER_OF_MAIL_PER_BATCH` and `MISSIVE_QUEUE_PERIOD`
/// environment variables, which win over the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of notifications sent per cycle
    #[serde(default = "default_number_of_mail_per_batch")]
    pub number_of_mail_per_batch: usize,

    /// Seconds between cycles
    #[serde(default = "default_period", alias = "period")]
    pub period_secs: u64,

    /// Seconds to wait for the mail transport before giving up on a send
    #[serde(default = "default_transport_timeout")]
    pub transport_timeout_secs: u64,

    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// Collect per-plugin put/poll counts
    #[serde(default)]
    pub statistics: bool,

    /// Initial position of the delivery switch
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            number_of_mail_per_batch: default_number_of_mail_per_batch(),
            period_secs: default_period(),
            transport_timeout_secs: default_transport_timeout(),
            overflow: OverflowPolicy::default(),
            statistics: false,
            enabled: default_enabled(),
        }
    }
}

impl QueueConfig {
    /// Apply the environment overrides
    #[must_use]
    pub fn with_overrides(mut self) -> Self {
        self.number_of_mail_per_batch =
            system_value(BATCH_LIMIT_OVERRIDE, self.number_of_mail_per_batch);
        self.period_secs = system_value(PERIOD_OVERRIDE, self.period_secs);
        self
    }

    /// The schedule these settings describe
    ///
    /// A zero batch size or period falls back to its default.
    pub fn schedule(&self) -> Schedule {
        let limit = if self.number_of_mail_per_batch == 0 {
            internal!(level = WARN, "number_of_mail_per_batch is 0, using {DEFAULT_BATCH_LIMIT}");
            DEFAULT_BATCH_LIMIT
        } else {
            self.number_of_mail_per_batch
        };

        let interval = if self.period_secs == 0 {
            internal!(level = WARN, "period_secs is 0, using {}", DEFAULT_PERIOD.as_secs());
            DEFAULT_PERIOD
        } else {
            Duration::from_secs(self.period_secs)
        };

        Schedule::new(limit, interval).unwrap_or_default()
    }

    pub const fn transport_timeout(&self) -> Duration {
        Duration::from_secs(self.transport_timeout_secs)
    }
}
