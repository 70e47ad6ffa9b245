//! In-memory storage backend.
//!
//! This module provides thread-safe in-memory implementations of the storage traits.
//! It is intended for embedded usage, tests, and as a reference implementation.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use crate::column::Column;
use crate::provenance::Provenance;
use crate::source::ProductRecord;
use crate::storage::traits::{CacheStore, ColumnReader, Extracted, RecordRepository, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// In-memory product catalogue.
#[derive(Debug, Default)]
pub struct InMemoryRecordRepository {
    collections: RwLock<BTreeMap<String, Vec<ProductRecord>>>,
}

impl InMemoryRecordRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a product, replacing one with the same identifier.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn insert(&self, record: ProductRecord) -> Result<(), StorageError> {
        let mut collections = self.collections.write().map_err(|_| lock_err("repository.insert"))?;
        let products = collections.entry(record.collection.clone()).or_default();
        products.retain(|p| p.identifier != record.identifier);
        let position = products.partition_point(|p| p.start <= record.start);
        products.insert(position, record);
        Ok(())
    }

    /// Creates an empty collection.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn create_collection(&self, collection: &str) -> Result<(), StorageError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| lock_err("repository.create_collection"))?;
        collections.entry(collection.to_string()).or_default();
        Ok(())
    }

    fn with_collection<T>(
        &self,
        collection: &str,
        context: &'static str,
        f: impl FnOnce(&[ProductRecord]) -> T,
    ) -> Result<T, StorageError> {
        let collections = self.collections.read().map_err(|_| lock_err(context))?;
        let products = collections
            .get(collection)
            .ok_or_else(|| StorageError::CollectionNotFound(collection.to_string()))?;
        Ok(f(products))
    }
}

impl RecordRepository for InMemoryRecordRepository {
    fn list(
        &self,
        collection: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<Vec<ProductRecord>, StorageError> {
        let (low, high) = (start - tolerance, end + tolerance);
        self.with_collection(collection, "repository.list", |products| {
            products
                .iter()
                .filter(|p| p.end > low && p.start < high)
                .cloned()
                .collect()
        })
    }

    fn sample_one(&self, collection: &str) -> Result<Option<ProductRecord>, StorageError> {
        self.with_collection(collection, "repository.sample_one", |products| {
            products.first().cloned()
        })
    }

    fn list_all(&self, collection: &str) -> Result<Vec<ProductRecord>, StorageError> {
        self.with_collection(collection, "repository.list_all", <[ProductRecord]>::to_vec)
    }
}

#[derive(Debug, Clone)]
struct StoredVariable {
    column: Column,
    constant: bool,
}

/// In-memory product contents keyed by product identifier.
#[derive(Debug, Default)]
pub struct InMemoryColumnReader {
    products: RwLock<HashMap<String, HashMap<String, StoredVariable>>>,
    broken: RwLock<HashMap<String, String>>,
}

impl InMemoryColumnReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a row-varying variable of a product.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn insert(&self, product: &str, variable: &str, column: Column) -> Result<(), StorageError> {
        self.store(product, variable, StoredVariable {
            column,
            constant: false,
        })
    }

    /// Stores a non-row-varying (single row) variable of a product.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn insert_constant(
        &self,
        product: &str,
        variable: &str,
        column: Column,
    ) -> Result<(), StorageError> {
        self.store(product, variable, StoredVariable {
            column,
            constant: true,
        })
    }

    /// Makes every read of `product` fail, simulating a corrupt file.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn mark_broken(&self, product: &str, message: &str) -> Result<(), StorageError> {
        let mut broken = self.broken.write().map_err(|_| lock_err("reader.mark_broken"))?;
        broken.insert(product.to_string(), message.to_string());
        Ok(())
    }

    fn store(&self, product: &str, variable: &str, stored: StoredVariable) -> Result<(), StorageError> {
        let mut products = self.products.write().map_err(|_| lock_err("reader.insert"))?;
        products
            .entry(product.to_string())
            .or_default()
            .insert(variable.to_string(), stored);
        Ok(())
    }
}

impl ColumnReader for InMemoryColumnReader {
    fn read(
        &self,
        record: &ProductRecord,
        variable: &str,
        rows: Option<Range<usize>>,
    ) -> Result<Extracted, StorageError> {
        {
            let broken = self.broken.read().map_err(|_| lock_err("reader.read"))?;
            if let Some(message) = broken.get(&record.identifier) {
                return Err(StorageError::ReadFailed {
                    record: record.identifier.clone(),
                    message: message.clone(),
                });
            }
        }

        let products = self.products.read().map_err(|_| lock_err("reader.read"))?;
        let stored = products
            .get(&record.identifier)
            .ok_or_else(|| StorageError::RecordNotFound(record.identifier.clone()))?
            .get(variable)
            .ok_or_else(|| StorageError::VariableNotFound {
                record: record.identifier.clone(),
                variable: variable.to_string(),
            })?;

        if stored.constant {
            return Ok(Extracted::Constant(stored.column.clone()));
        }
        match rows {
            None => Ok(Extracted::Rows(stored.column.clone())),
            Some(range) => stored
                .column
                .slice(range)
                .map(Extracted::Rows)
                .map_err(|e| StorageError::ReadFailed {
                    record: record.identifier.clone(),
                    message: e.to_string(),
                }),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    column: Column,
    provenance: Provenance,
}

/// In-memory derived-value cache.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<BTreeMap<String, BTreeMap<String, CacheEntry>>>,
}

impl InMemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached `(record, model)` entries.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let entries = self.entries.read().map_err(|_| lock_err("cache.len"))?;
        Ok(entries.values().map(BTreeMap::len).sum())
    }
}

impl CacheStore for InMemoryCacheStore {
    fn read_provenance(
        &self,
        record: &str,
        model: &str,
    ) -> Result<Option<Provenance>, StorageError> {
        let entries = self.entries.read().map_err(|_| lock_err("cache.read_provenance"))?;
        Ok(entries
            .get(record)
            .and_then(|models| models.get(model))
            .map(|entry| entry.provenance.clone()))
    }

    fn read_column(&self, record: &str, model: &str) -> Result<Option<Column>, StorageError> {
        let entries = self.entries.read().map_err(|_| lock_err("cache.read_column"))?;
        Ok(entries
            .get(record)
            .and_then(|models| models.get(model))
            .map(|entry| entry.column.clone()))
    }

    fn write(
        &self,
        record: &str,
        model: &str,
        column: Column,
        provenance: Provenance,
    ) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| lock_err("cache.write"))?;
        entries
            .entry(record.to_string())
            .or_default()
            .insert(model.to_string(), CacheEntry { column, provenance });
        Ok(())
    }

    fn remove(&self, record: &str, model: &str) -> Result<bool, StorageError> {
        let mut entries = self.entries.write().map_err(|_| lock_err("cache.remove"))?;
        let Some(models) = entries.get_mut(record) else {
            return Ok(false);
        };
        let removed = models.remove(model).is_some();
        if models.is_empty() {
            entries.remove(record);
        }
        Ok(removed)
    }

    fn models(&self, record: &str) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| lock_err("cache.models"))?;
        Ok(entries
            .get(record)
            .map(|models| models.keys().cloned().collect())
            .unwrap_or_default())
    }
}
