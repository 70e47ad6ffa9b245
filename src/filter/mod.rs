//! Row filters.
//!
//! A filter narrows a row index of a dataset. Filters declare the
//! variables they need; the pipeline applies each filter as soon as those
//! variables are present in the chunk.

mod range;
mod sampling;

use std::fmt;
use std::sync::{Arc, OnceLock};

pub use range::{BoundingBoxFilter, ScalarRangeFilter, VectorComponentRangeFilter};
pub use sampling::MinStepSampler;

use crate::dataset::Dataset;
use crate::error::FusionResult;

/// Row filter.
pub trait Filter: Send + Sync + fmt::Debug + fmt::Display {
    /// Variables the filter reads.
    fn required_variables(&self) -> &[String];

    /// Returns the rows of `dataset` that pass, as a subset of `index`
    /// (all rows when `None`), preserving order.
    fn filter(&self, dataset: &Dataset, index: Option<Vec<usize>>) -> FusionResult<Vec<usize>>;
}

/// Filter rejecting every row.
///
/// Substituted for the resolved filters when any declared filter cannot be
/// evaluated, so that no unfiltered data leaks out.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectAll;

impl RejectAll {
    /// Shared instance.
    #[must_use]
    pub fn shared() -> Arc<dyn Filter> {
        static INSTANCE: OnceLock<Arc<dyn Filter>> = OnceLock::new();
        Arc::clone(INSTANCE.get_or_init(|| Arc::new(Self)))
    }
}

impl fmt::Display for RejectAll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RejectAll()")
    }
}

impl Filter for RejectAll {
    fn required_variables(&self) -> &[String] {
        &[]
    }

    fn filter(&self, _dataset: &Dataset, _index: Option<Vec<usize>>) -> FusionResult<Vec<usize>> {
        Ok(Vec::new())
    }
}

/// Keeps the entries of `index` (all rows when `None`) for which `keep`
/// holds.
pub(crate) fn retain_rows(
    len: usize,
    index: Option<Vec<usize>>,
    mut keep: impl FnMut(usize) -> bool,
) -> Vec<usize> {
    match index {
        None => (0..len).filter(|&row| keep(row)).collect(),
        Some(mut rows) => {
            rows.retain(|&row| keep(row));
            rows
        }
    }
}

/// Formats filters for error messages.
#[must_use]
pub fn describe_filters(filters: &[Arc<dyn Filter>]) -> String {
    filters
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
