//! Product sources over one or several redundant collections.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use super::selector::{PrioritySelector, SupersedingSelector};
use super::{ProductRecord, Record};
use crate::error::{FusionResult, ValidationError};
use crate::storage::RecordRepository;
use crate::time::TimeRange;

/// Largest number of collections a source may combine.
pub const MAX_COLLECTIONS: usize = 256;

/// Lists the records covering a time window.
///
/// With one collection, overlapping products are resolved by temporal
/// supersession; with several, by collection priority (first listed
/// collection wins).
pub struct ProductSource {
    repository: Arc<dyn RecordRepository>,
    collections: Vec<String>,
    identifier: String,
}

impl fmt::Debug for ProductSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductSource")
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}

impl ProductSource {
    /// Creates a source over collections listed in priority order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for no collections, more than
    /// [`MAX_COLLECTIONS`], or duplicates.
    pub fn new(
        repository: Arc<dyn RecordRepository>,
        collections: Vec<String>,
    ) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidParameter {
            name: "collections".to_string(),
            reason: reason.to_string(),
        };
        if collections.is_empty() {
            return Err(invalid("at least one collection must be given"));
        }
        if collections.len() > MAX_COLLECTIONS {
            return Err(invalid("maximum number of collections exceeded"));
        }
        let unique: HashSet<&str> = collections.iter().map(String::as_str).collect();
        if unique.len() < collections.len() {
            return Err(invalid("combined collections are not unique"));
        }
        Ok(Self {
            identifier: collections.join("+"),
            repository,
            collections,
        })
    }

    /// Creates a single-collection source.
    pub fn single(repository: Arc<dyn RecordRepository>, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        Self {
            identifier: collection.clone(),
            repository,
            collections: vec![collection],
        }
    }

    /// Collections joined with `+`.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    /// True when the source resolves overlaps by priority.
    #[must_use]
    pub fn is_multi_collection(&self) -> bool {
        self.collections.len() > 1
    }

    /// Resolves the records to be read for `window`.
    ///
    /// Products are listed with the window widened by `tolerance`; the
    /// returned spans are non-overlapping, sorted, clipped to `window` and
    /// never empty.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub fn iter_records(&self, window: &TimeRange, tolerance: Duration) -> FusionResult<RecordIter> {
        let mut listed = Vec::with_capacity(self.collections.len());
        for (priority, collection) in self.collections.iter().enumerate() {
            let products = self
                .repository
                .list(collection, window.start, window.end, tolerance)?;
            debug!(
                collection = %collection,
                window = %window,
                products = products.len(),
                "listed products"
            );
            listed.extend(
                products
                    .into_iter()
                    .map(|product| Record::from_product(priority, product)),
            );
        }
        let selected = if self.is_multi_collection() {
            Selected::Priority(PrioritySelector::new(listed))
        } else {
            Selected::Superseding(SupersedingSelector::new(listed))
        };
        Ok(RecordIter {
            selected,
            window: *window,
        })
    }

    /// Number of records [`iter_records`](Self::iter_records) yields.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub fn count_records(&self, window: &TimeRange, tolerance: Duration) -> FusionResult<usize> {
        Ok(self.iter_records(window, tolerance)?.count())
    }

    /// Products of every collection, optionally restricted to those
    /// intersecting `window`, collection by collection in start order.
    ///
    /// No overlap resolution is applied.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub fn list_products(&self, window: Option<&TimeRange>) -> FusionResult<Vec<ProductRecord>> {
        let mut products = Vec::new();
        for collection in &self.collections {
            match window {
                Some(window) => products.extend(self.repository.list(
                    collection,
                    window.start,
                    window.end,
                    Duration::zero(),
                )?),
                None => products.extend(self.repository.list_all(collection)?),
            }
        }
        Ok(products)
    }

    /// First product of the first non-empty collection.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub fn sample_record(&self) -> FusionResult<Option<ProductRecord>> {
        for collection in &self.collections {
            if let Some(product) = self.repository.sample_one(collection)? {
                return Ok(Some(product));
            }
        }
        Ok(None)
    }
}

#[derive(Debug)]
enum Selected {
    Superseding(SupersedingSelector),
    Priority(PrioritySelector),
}

/// Selected records clipped to the query window.
#[derive(Debug)]
pub struct RecordIter {
    selected: Selected,
    window: TimeRange,
}

impl Iterator for RecordIter {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            let record = match &mut self.selected {
                Selected::Superseding(selector) => selector.next(),
                Selected::Priority(selector) => selector.next(),
            }?;
            let clipped = record.clipped(self.window.start, self.window.end);
            if !clipped.is_empty() {
                return Some(clipped);
            }
        }
    }
}
