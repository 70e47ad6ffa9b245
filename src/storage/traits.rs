//! Abstract storage traits for timefuse.
//!
//! The fusion core never touches files or databases directly. Product
//! listings, column decoding and the derived-value cache are injected
//! through these traits so that:
//! - tests and embedded users run on the in-memory backends
//! - production deployments plug in their own catalogue and file readers

use std::ops::Range;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::column::Column;
use crate::provenance::Provenance;
use crate::source::ProductRecord;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Record not found.
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Collection not found.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// The record has no such variable.
    #[error("Variable '{variable}' not found in record {record}")]
    VariableNotFound {
        /// Record identifier.
        record: String,
        /// Requested variable.
        variable: String,
    },

    /// Underlying data is missing or corrupt.
    #[error("Failed to read record {record}: {message}")]
    ReadFailed {
        /// Record identifier.
        record: String,
        /// Failure description.
        message: String,
    },

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Catalogue of products grouped into collections.
pub trait RecordRepository: Send + Sync {
    /// Lists products of `collection` intersecting
    /// `[start - tolerance, end + tolerance)`, ordered by start time.
    fn list(
        &self,
        collection: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<Vec<ProductRecord>, StorageError>;

    /// Returns any one product of the collection, used to infer column types
    /// when a query matches nothing.
    fn sample_one(&self, collection: &str) -> Result<Option<ProductRecord>, StorageError>;

    /// Lists every product of the collection ordered by start time.
    fn list_all(&self, collection: &str) -> Result<Vec<ProductRecord>, StorageError>;
}

/// Result of reading one variable of a product.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// Row-varying values for the requested rows.
    Rows(Column),
    /// A non-row-varying value (single row) to be broadcast by the caller.
    Constant(Column),
}

/// Decoder of product contents.
pub trait ColumnReader: Send + Sync {
    /// Reads `variable` of `record`, restricted to `rows` when given.
    ///
    /// Non-row-varying variables ignore `rows` and return
    /// [`Extracted::Constant`].
    fn read(
        &self,
        record: &ProductRecord,
        variable: &str,
        rows: Option<Range<usize>>,
    ) -> Result<Extracted, StorageError>;
}

/// Per-record store of derived (model) columns.
///
/// Entries are keyed by `(record identifier, model name)`; a cached column
/// always covers every row of the record.
pub trait CacheStore: Send + Sync {
    /// Provenance the entry was computed from, if the entry exists.
    fn read_provenance(&self, record: &str, model: &str)
        -> Result<Option<Provenance>, StorageError>;

    /// Cached values, if the entry exists.
    fn read_column(&self, record: &str, model: &str) -> Result<Option<Column>, StorageError>;

    /// Writes or replaces an entry.
    fn write(
        &self,
        record: &str,
        model: &str,
        column: Column,
        provenance: Provenance,
    ) -> Result<(), StorageError>;

    /// Removes an entry. Returns whether it existed.
    fn remove(&self, record: &str, model: &str) -> Result<bool, StorageError>;

    /// Lists the model names cached for a record.
    fn models(&self, record: &str) -> Result<Vec<String>, StorageError>;
}
