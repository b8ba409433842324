pub mod backends;
pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod store;
pub mod types;

pub use backends::{FileBackingStore, FileBackingStoreBuilder, MemoryBackingStore, TestBackingStore};
pub use config::SpoolConfig;
pub use error::{CodecError, Result, SpoolError, ValidationError};
pub use message::MessageRecord;
pub use store::MessageStore;
pub use types::RecordId;
