//! Storage seams for timefuse.
//!
//! Traits for the injected collaborators (product catalogue, column reader,
//! derived-value cache) and their in-memory implementations.

pub mod memory;
mod traits;

pub use memory::{InMemoryCacheStore, InMemoryColumnReader, InMemoryRecordRepository};
pub use traits::{CacheStore, ColumnReader, Extracted, RecordRepository, StorageError};
