//! Backing store implementations
//!
//! - `memory`: records held in process, for development and tests
//! - `test`: a memory store instrumented for assertions and fault injection
//! - `file`: one compressed file per record, for production use

pub mod file;
pub mod memory;
pub mod test;

pub use file::{FileBackingStore, FileBackingStoreBuilder};
pub use memory::MemoryBackingStore;
pub use test::TestBackingStore;
