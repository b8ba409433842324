use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::RecordId;

/// A queued, already rendered notification email
///
/// Records are immutable once appended. The `id` is `None` until a backing
/// store persists the record, and `created_time` is the storage key: a
/// nanosecond timestamp the queue guarantees to be unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    #[serde(skip)]
    pub id: Option<RecordId>,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub plugin_id: String,
    #[serde(default)]
    pub owner_parameters: BTreeMap<String, String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub footer: String,
    pub created_time: u64,
}

impl MessageRecord {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn plugin_id(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = plugin_id.into();
        self
    }

    #[must_use]
    pub fn owner_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.owner_parameters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    #[must_use]
    pub const fn created_time(mut self, created_time: u64) -> Self {
        self.created_time = created_time;
        self
    }

    /// The identifier, or `"-"` for records not yet persisted. Used in log fields.
    pub fn id_display(&self) -> String {
        self.id
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string)
    }
}
