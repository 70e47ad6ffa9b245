//! Records: time-bounded units of underlying data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::TimeRange;

/// A stored product (typically one file) of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Unique product identifier.
    pub identifier: String,
    /// Owning collection.
    pub collection: String,
    /// First covered instant (inclusive).
    pub start: DateTime<Utc>,
    /// End of coverage (exclusive).
    pub end: DateTime<Utc>,
    /// False when the product rows are not in time order.
    #[serde(default = "default_sorted")]
    pub sorted: bool,
}

const fn default_sorted() -> bool {
    true
}

impl ProductRecord {
    pub fn new(
        identifier: impl Into<String>,
        collection: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            collection: collection.into(),
            start,
            end,
            sorted: true,
        }
    }

    /// Marks the product rows as not time-ordered.
    #[must_use]
    pub fn unsorted(mut self) -> Self {
        self.sorted = false;
        self
    }

    #[must_use]
    pub const fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// A resolved, clipped span of one product.
///
/// `priority` is the index of the product's collection in the caller's
/// priority order; lower wins. `[start, end)` is the part of the product
/// that must be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub priority: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub payload: ProductRecord,
}

impl Record {
    /// Creates a record covering the whole product.
    #[must_use]
    pub fn from_product(priority: usize, payload: ProductRecord) -> Self {
        Self {
            priority,
            start: payload.start,
            end: payload.end,
            payload,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    #[must_use]
    pub const fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }

    /// Returns a copy restricted to `[start, end)`.
    #[must_use]
    pub fn clipped(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            priority: self.priority,
            start: self.start.max(start),
            end: self.end.min(end),
            payload: self.payload.clone(),
        }
    }

    /// Identifier of the underlying product.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.payload.identifier
    }
}
