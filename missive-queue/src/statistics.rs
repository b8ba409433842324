use std::collections::BTreeMap;

use dashmap::DashMap;

/// Per-plugin queue traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PluginCounts {
    /// Notifications accepted into the queue
    pub put: u64,
    /// Notifications delivered (or discarded) and taken off the queue
    pub polled: u64,
}

/// Counts of notifications entering and leaving the queue, keyed by plugin id
///
/// Only collected when statistics are enabled in the queue configuration.
#[derive(Debug, Default)]
pub struct QueueStatistics {
    counts: DashMap<String, PluginCounts>,
}

impl QueueStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_queue(&self, plugin_id: &str) {
        self.counts.entry(plugin_id.to_string()).or_default().put += 1;
    }

    pub fn poll_queue(&self, plugin_id: &str) {
        self.counts.entry(plugin_id.to_string()).or_default().polled += 1;
    }

    pub fn get(&self, plugin_id: &str) -> PluginCounts {
        self.counts
            .get(plugin_id)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    /// Consistent-per-plugin copy of every counter, ordered by plugin id
    pub fn snapshot(&self) -> BTreeMap<String, PluginCounts> {
        self.counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn reset(&self) {
        self.counts.clear();
    }
}
