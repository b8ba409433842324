use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    ops::Bound,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use missive_common::internal;

use crate::{
    SpoolError, codec, message::MessageRecord, store::MessageStore, types::RecordId,
};

#[derive(Debug, Clone)]
struct StoredRecord {
    id: RecordId,
    payload: Arc<[u8]>,
}

#[derive(Debug, Default)]
struct Records {
    by_time: BTreeMap<u64, StoredRecord>,
    by_id: HashMap<RecordId, u64>,
}

/// In-memory backing store implementation
///
/// Records are kept encoded, exactly as the file store writes them, in a
/// `BTreeMap` keyed by creation time and protected by an `RwLock`. It is meant
/// for development and tests; nothing survives a restart.
///
/// # Capacity Management
/// The store can be given a maximum number of records. Appends beyond it fail
/// with [`SpoolError::CapacityExceeded`].
///
/// # Performance
/// - Append: O(log n) plus encoding
/// - Load: O(log n + limit) plus decoding
/// - Delete: O(k log n) for k ids
#[derive(Debug, Clone, Default)]
pub struct MemoryBackingStore {
    records: Arc<RwLock<Records>>,
    /// Maximum number of records to store (None = unlimited)
    capacity: Option<usize>,
}

impl MemoryBackingStore {
    /// Create a new empty memory-backed store with unlimited capacity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new memory-backed store with a capacity limit
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::default(),
            capacity: Some(capacity),
        }
    }

    /// Get the current number of records in the store
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .by_time
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the configured capacity (None = unlimited)
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Store a raw payload under `created_time`, bypassing the codec
    pub(crate) fn insert_payload(
        &self,
        created_time: u64,
        payload: &[u8],
    ) -> crate::Result<RecordId> {
        let mut records = self.records.write()?;

        if records.by_time.contains_key(&created_time) {
            return Err(SpoolError::DuplicateKey(created_time));
        }

        if let Some(capacity) = self.capacity
            && records.by_time.len() >= capacity
        {
            return Err(SpoolError::CapacityExceeded {
                len: records.by_time.len(),
                capacity,
            });
        }

        let id = RecordId::generate();
        records.by_time.insert(
            created_time,
            StoredRecord {
                id: id.clone(),
                payload: Arc::from(payload),
            },
        );
        records.by_id.insert(id.clone(), created_time);

        Ok(id)
    }
}

#[async_trait]
impl MessageStore for MemoryBackingStore {
    async fn append(&self, record: &MessageRecord) -> crate::Result<RecordId> {
        let payload = codec::encode(record)?;
        self.insert_payload(record.created_time, &payload)
    }

    async fn load_batch(&self, since_time: u64, limit: usize) -> crate::Result<Vec<MessageRecord>> {
        let records = self.records.read()?;
        let mut batch = Vec::with_capacity(limit.min(records.by_time.len()));

        // Undecodable entries do not count towards `limit`
        for (created_time, stored) in records
            .by_time
            .range((Bound::Excluded(since_time), Bound::Unbounded))
        {
            if batch.len() >= limit {
                break;
            }

            match codec::decode(&stored.payload) {
                Ok(mut record) => {
                    record.id = Some(stored.id.clone());
                    batch.push(record);
                }
                Err(e) => {
                    tracing::warn!(
                        id = %stored.id,
                        created_time,
                        error = %e,
                        "Skipping record with undecodable payload"
                    );
                }
            }
        }

        Ok(batch)
    }

    async fn delete_by_ids(&self, ids: &BTreeSet<RecordId>) -> crate::Result<Vec<RecordId>> {
        let mut records = self.records.write()?;
        let mut removed = Vec::with_capacity(ids.len());

        for id in ids {
            if let Some(created_time) = records.by_id.remove(id) {
                records.by_time.remove(&created_time);
                removed.push(id.clone());
            } else {
                internal!(level = DEBUG, "Record {id} already removed");
            }
        }

        Ok(removed)
    }

    async fn count(&self) -> crate::Result<usize> {
        Ok(self.records.read()?.by_time.len())
    }
}
