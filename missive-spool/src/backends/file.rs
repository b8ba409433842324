use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use missive_common::internal;
use missive_tracing::traced;
use tokio::{fs, sync::Mutex};

use crate::{
    SpoolError, ValidationError, codec, message::MessageRecord, store::MessageStore,
    types::RecordId,
};

const EXTENSION: &str = ".msg";
const TEMP_PREFIX: &str = ".tmp_";
const DELETED_SUFFIX: &str = ".deleted";

/// Name of a stored record: `{created_time:020}-{id}.msg`
///
/// Zero padding makes lexicographic and numeric order agree, so a directory
/// listing already reflects queue order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EntryName {
    created_time: u64,
    id: RecordId,
}

impl EntryName {
    fn file_name(&self) -> String {
        format!("{:020}-{}{EXTENSION}", self.created_time, self.id)
    }

    /// Parse a file name, rejecting temporaries and anything that is not a record
    fn parse(filename: &str) -> Option<Self> {
        if filename.starts_with(TEMP_PREFIX) {
            return None;
        }

        let stem = filename.strip_suffix(EXTENSION)?;
        let (created_time, id) = stem.split_once('-')?;

        Some(Self {
            created_time: created_time.parse().ok()?,
            id: RecordId::parse(id)?,
        })
    }
}

/// File-based backing store implementation
///
/// Each record is one gzip-compressed JSON file named after its creation time
/// and id (see [`EntryName`]).
///
/// # Atomicity
/// Appends write to a `.tmp_` file and rename it into place, so a crash never
/// leaves a partially written record visible. Deletes rename the file to a
/// `.deleted` name before removing it. Leftovers of either kind are removed by
/// [`FileBackingStore::init`].
///
/// # Concurrency
/// Appends and deletes are serialised by a per-store mutex; loads only read.
#[derive(Debug)]
pub struct FileBackingStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackingStore {
    /// Validate a spool path for security
    ///
    /// # Security Checks
    /// - Rejects paths containing `..` (directory traversal)
    /// - Rejects paths to sensitive system directories
    /// - Ensures the path is absolute
    ///
    /// # Errors
    /// Returns an error if the path is invalid or potentially dangerous
    pub fn validate_path(path: &Path) -> Result<(), ValidationError> {
        if path
            .components()
            .any(|component| component == std::path::Component::ParentDir)
        {
            return Err(ValidationError::ParentDirectory(path.display().to_string()));
        }

        if !path.is_absolute() {
            return Err(ValidationError::NotAbsolute(path.display().to_string()));
        }

        let sensitive_prefixes = [
            "/etc",
            "/bin",
            "/sbin",
            "/usr/bin",
            "/usr/sbin",
            "/boot",
            "/sys",
            "/proc",
            "/dev",
        ];

        for prefix in sensitive_prefixes {
            if path.starts_with(prefix) {
                return Err(ValidationError::SystemDirectory {
                    prefix: prefix.to_string(),
                    path: path.display().to_string(),
                });
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn builder() -> FileBackingStoreBuilder {
        FileBackingStoreBuilder::default()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Initialise the spool directory
    ///
    /// Creates the directory if needed and removes temporaries and half-deleted
    /// files left behind by a crash.
    ///
    /// # Errors
    /// - If the directory cannot be created or read
    /// - If the path exists but is not a directory
    pub fn init(&self) -> crate::Result<()> {
        internal!("Initialising spool at {} ...", self.path.display());

        if !self.path.try_exists()? {
            internal!("{} does not exist, creating...", self.path.display());
            std::fs::create_dir_all(&self.path)?;
        } else if !self.path.is_dir() {
            return Err(ValidationError::NotDirectory(self.path.display().to_string()).into());
        }

        self.cleanup_orphans()
    }

    fn cleanup_orphans(&self) -> crate::Result<()> {
        let mut cleaned = 0;

        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            let filename = entry.file_name();
            let filename = filename.to_string_lossy();

            if filename.starts_with(TEMP_PREFIX) || filename.ends_with(DELETED_SUFFIX) {
                std::fs::remove_file(entry.path())?;
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            internal!(
                level = INFO,
                "Cleaned up {cleaned} orphaned files from spool"
            );
        }

        Ok(())
    }

    /// All record entries in the directory, in queue order
    async fn entries(&self) -> crate::Result<Vec<EntryName>> {
        let mut dir = fs::read_dir(&self.path).await?;
        let mut entries = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let filename = entry.file_name();
            if let Some(name) = EntryName::parse(&filename.to_string_lossy()) {
                entries.push(name);
            }
        }

        entries.sort();
        Ok(entries)
    }

    async fn remove_entry(&self, name: &EntryName) -> std::io::Result<()> {
        let path = self.path.join(name.file_name());
        let deleted = self.path.join(format!("{}{DELETED_SUFFIX}", name.file_name()));

        fs::rename(&path, &deleted).await?;
        fs::remove_file(&deleted).await
    }
}

#[async_trait]
impl MessageStore for FileBackingStore {
    #[traced(instrument(level = tracing::Level::DEBUG, skip(self, record), fields(created_time = record.created_time)), timing(precision = "ms"))]
    async fn append(&self, record: &MessageRecord) -> crate::Result<RecordId> {
        let payload = codec::encode(record)?;
        let name = EntryName {
            created_time: record.created_time,
            id: RecordId::generate(),
        };

        let path = self.path.join(name.file_name());
        let temp_path = self.path.join(format!("{TEMP_PREFIX}{}", name.file_name()));

        let _guard = self.write_lock.lock().await;

        if self
            .entries()
            .await?
            .iter()
            .any(|entry| entry.created_time == name.created_time)
        {
            return Err(SpoolError::DuplicateKey(name.created_time));
        }

        fs::write(&temp_path, &payload).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        internal!(
            level = DEBUG,
            "Spooled record {} to {}",
            name.id,
            path.display()
        );

        Ok(name.id)
    }

    #[traced(instrument(level = tracing::Level::DEBUG, skip(self)), timing(precision = "ms"))]
    async fn load_batch(&self, since_time: u64, limit: usize) -> crate::Result<Vec<MessageRecord>> {
        let selected = self
            .entries()
            .await?
            .into_iter()
            .filter(|name| name.created_time > since_time);

        // Unreadable or undecodable files do not count towards `limit`
        let mut batch = Vec::new();
        for name in selected {
            if batch.len() >= limit {
                break;
            }

            let bytes = match fs::read(self.path.join(name.file_name())).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(id = %name.id, error = %e, "Skipping unreadable record");
                    continue;
                }
            };

            match codec::decode(&bytes) {
                Ok(mut record) => {
                    record.id = Some(name.id);
                    batch.push(record);
                }
                Err(e) => {
                    tracing::warn!(
                        id = %name.id,
                        created_time = name.created_time,
                        error = %e,
                        "Skipping record with undecodable payload"
                    );
                }
            }
        }

        internal!(level = DEBUG, "Loaded {} records after {since_time}", batch.len());

        Ok(batch)
    }

    #[traced(instrument(level = tracing::Level::DEBUG, skip_all, fields(count = ids.len())), timing(precision = "ms"))]
    async fn delete_by_ids(&self, ids: &BTreeSet<RecordId>) -> crate::Result<Vec<RecordId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.write_lock.lock().await;

        let index: HashMap<RecordId, EntryName> = self
            .entries()
            .await?
            .into_iter()
            .map(|name| (name.id.clone(), name))
            .collect();

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(name) = index.get(id) else {
                internal!(level = DEBUG, "Record {id} already removed");
                continue;
            };

            match self.remove_entry(name).await {
                Ok(()) => removed.push(id.clone()),
                Err(e) => tracing::error!(%id, error = %e, "Failed to remove record"),
            }
        }

        Ok(removed)
    }

    async fn count(&self) -> crate::Result<usize> {
        Ok(self.entries().await?.len())
    }
}

/// Builder for `FileBackingStore`
#[derive(Debug, Default)]
pub struct FileBackingStoreBuilder {
    path: PathBuf,
}

impl FileBackingStoreBuilder {
    /// Set the spool directory path
    #[must_use]
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Build the final `FileBackingStore`
    ///
    /// # Errors
    /// Returns an error if the path is invalid or potentially dangerous
    pub fn build(self) -> Result<FileBackingStore, ValidationError> {
        FileBackingStore::validate_path(&self.path)?;
        Ok(FileBackingStore {
            path: self.path,
            write_lock: Mutex::new(()),
        })
    }
}
