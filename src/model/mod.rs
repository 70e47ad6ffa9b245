//! Derived-value models.
//!
//! A model reads its required variables from a dataset and produces new
//! variables for the same rows. Models are evaluated chunk by chunk in
//! the order the resolver accepted them.

mod builtin;
mod cache;
mod gap_fill;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub use builtin::{Identity, Label, VectorIntensity};
pub use cache::{change_token, ModelCache, ModelLoader};
pub use gap_fill::{intermediate_variable, ModelGapFill, SourceModel};

use crate::dataset::Dataset;
use crate::error::FusionResult;
use crate::provenance::Provenance;
use crate::time::TimeRange;

/// Derived-value model.
pub trait Model: Send + Sync + fmt::Debug {
    /// Model name, used as the cache key of its values.
    fn name(&self) -> &str;

    /// Variables the model produces.
    fn variables(&self) -> &[String];

    /// Variables the model reads.
    fn required_variables(&self) -> &[String];

    /// Evaluates the requested variables (all when `None`) for every row
    /// of `dataset`.
    ///
    /// The result holds only requested variables the model produces.
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing or malformed.
    fn eval(&self, dataset: &Dataset, variables: Option<&[String]>) -> FusionResult<Dataset>;

    /// External inputs the model would use for `window`.
    fn sources(&self, _window: &TimeRange) -> Provenance {
        Provenance::default()
    }

    /// Identifiers of the inputs used by the evaluations so far.
    fn products(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Number of components of an output variable.
    fn output_width(&self, _variable: &str) -> usize {
        1
    }
}

/// Requested variables of a model: `variables` restricted to what the
/// model produces, in model order.
pub(crate) fn requested<'a>(model: &'a dyn Model, variables: Option<&[String]>) -> Vec<&'a str> {
    model
        .variables()
        .iter()
        .filter(|v| variables.map_or(true, |requested| requested.contains(v)))
        .map(String::as_str)
        .collect()
}

/// Shared model handle.
pub type SharedModel = Arc<dyn Model>;
