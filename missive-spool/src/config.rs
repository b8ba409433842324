use std::{path::PathBuf, sync::Arc};

use serde::Deserialize;

use crate::{
    backends::{FileBackingStore, MemoryBackingStore},
    store::MessageStore,
};

fn default_spool_path() -> PathBuf {
    PathBuf::from("/var/spool/missive")
}

/// Configuration for the spool backing store
///
/// File-backed spool in RON config:
/// ```ron
/// spool: File(
///     path: "/var/spool/missive",
/// ),
/// ```
///
/// Memory-backed spool, optionally bounded:
/// ```ron
/// spool: Memory(
///     capacity: Some(1000),
/// ),
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum SpoolConfig {
    /// File-based spool (production)
    File {
        #[serde(default = "default_spool_path")]
        path: PathBuf,
    },
    /// Memory-based spool (testing/development)
    Memory {
        /// Maximum number of records to store (omit for unlimited)
        #[serde(default)]
        capacity: Option<usize>,
    },
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self::File {
            path: default_spool_path(),
        }
    }
}

impl SpoolConfig {
    /// The spool directory for file-backed spools
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File { path } => Some(path),
            Self::Memory { .. } => None,
        }
    }

    /// Build and initialise the configured store
    ///
    /// # Errors
    /// If the file spool path is rejected or the directory cannot be prepared.
    pub fn into_store(self) -> crate::Result<Arc<dyn MessageStore>> {
        match self {
            Self::File { path } => {
                let store = FileBackingStore::builder().path(path).build()?;
                store.init()?;
                Ok(Arc::new(store))
            }
            Self::Memory { capacity } => Ok(capacity.map_or_else(
                || Arc::new(MemoryBackingStore::new()) as Arc<dyn MessageStore>,
                |capacity| Arc::new(MemoryBackingStore::with_capacity(capacity)),
            )),
        }
    }
}
