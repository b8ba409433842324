use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::{message::MessageRecord, types::RecordId};

/// Durable, creation-time ordered storage for queued records
///
/// Implementations must make an append either fully visible or not visible at
/// all, and must serialise concurrent appends themselves; producers call
/// [`MessageStore::append`] from many tasks at once.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Persist `record` keyed by its `created_time` and return the id assigned to it
    ///
    /// # Errors
    /// If the record could not be persisted. Nothing is left behind in that case.
    async fn append(&self, record: &MessageRecord) -> crate::Result<RecordId>;

    /// Records keyed strictly after `since_time`, ascending, at most `limit` of them
    ///
    /// Records whose payload cannot be decoded are logged and skipped.
    ///
    /// # Errors
    /// If the store cannot be scanned.
    async fn load_batch(&self, since_time: u64, limit: usize) -> crate::Result<Vec<MessageRecord>>;

    /// Remove the given records, returning the ids actually removed
    ///
    /// Unknown ids are ignored, so repeating a removal is harmless. A failure to
    /// remove one record is logged and does not stop the others.
    ///
    /// # Errors
    /// Only if the store as a whole cannot be reached.
    async fn delete_by_ids(&self, ids: &BTreeSet<RecordId>) -> crate::Result<Vec<RecordId>>;

    /// Number of stored records
    ///
    /// # Errors
    /// If the store cannot be scanned.
    async fn count(&self) -> crate::Result<usize>;
}
