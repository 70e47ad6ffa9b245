//! Completion of cached or interpolated model values.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::Model;
use crate::column::Selection;
use crate::dataset::Dataset;
use crate::error::{FusionResult, ValidationError};
use crate::provenance::Provenance;
use crate::time::TimeRange;

/// Name under which a cached or interpolated model variable travels
/// before gaps are filled.
#[must_use]
pub fn intermediate_variable(variable: &str) -> String {
    format!("__intermediate__{variable}")
}

/// A model variable served from a per-record cache or interpolation.
#[derive(Debug, Clone)]
pub struct SourceModel {
    model: Arc<dyn Model>,
    variable: String,
    intermediate: String,
}

impl SourceModel {
    /// Selects `variable` of `model`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the model does not produce the
    /// variable.
    pub fn new(model: Arc<dyn Model>, variable: impl Into<String>) -> Result<Self, ValidationError> {
        let variable = variable.into();
        if !model.variables().contains(&variable) {
            return Err(ValidationError::InvalidParameter {
                name: "variable".to_string(),
                reason: format!("model {} does not produce {variable}", model.name()),
            });
        }
        Ok(Self {
            intermediate: intermediate_variable(&variable),
            model,
            variable,
        })
    }

    #[must_use]
    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    /// Cache key of the values.
    #[must_use]
    pub fn name(&self) -> &str {
        self.model.name()
    }

    #[must_use]
    pub fn variable(&self) -> &str {
        &self.variable
    }

    #[must_use]
    pub fn intermediate(&self) -> &str {
        &self.intermediate
    }

    /// True when values cached with `provenance` were computed from the
    /// sources the model currently uses over `window`.
    ///
    /// Sources are compared by name only.
    #[must_use]
    pub fn is_current(&self, provenance: &Provenance, window: &TimeRange) -> bool {
        provenance
            .restricted(window)
            .same_sources(&self.model.sources(window))
    }

    /// Components per row of the values.
    #[must_use]
    pub fn width(&self) -> usize {
        self.model.output_width(&self.variable)
    }
}

/// Publishes an intermediate model variable under its final name,
/// evaluating the live model for rows whose values are missing (NaN).
#[derive(Debug)]
pub struct ModelGapFill {
    source: SourceModel,
    variables: [String; 1],
    required: Vec<String>,
    products: Mutex<BTreeSet<String>>,
}

impl ModelGapFill {
    pub fn new(source: SourceModel) -> Self {
        let required = std::iter::once(source.intermediate().to_string())
            .chain(source.model().required_variables().iter().cloned())
            .collect();
        Self {
            variables: [source.variable().to_string()],
            required,
            source,
            products: Mutex::new(BTreeSet::new()),
        }
    }
}

impl Model for ModelGapFill {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn variables(&self) -> &[String] {
        &self.variables
    }

    fn required_variables(&self) -> &[String] {
        &self.required
    }

    fn eval(&self, dataset: &Dataset, variables: Option<&[String]>) -> FusionResult<Dataset> {
        let mut output = Dataset::new();
        let target = &self.variables[0];
        if variables.is_some_and(|requested| !requested.contains(target)) {
            return Ok(output);
        }

        let mut column = dataset.require(self.source.intermediate())?.clone();
        let gaps: Vec<usize> = column
            .nan_rows()
            .into_iter()
            .enumerate()
            .filter_map(|(row, missing)| missing.then_some(row))
            .collect();
        debug!(
            model = self.source.name(),
            missing = gaps.len(),
            rows = column.rows(),
            "filling missing model values"
        );

        if !gaps.is_empty() {
            let inputs = dataset
                .extract(self.source.model().required_variables())
                .into_subset(&Selection::Indices(gaps.clone()))?;
            let evaluated = self
                .source
                .model()
                .eval(&inputs, Some(std::slice::from_ref(target)))?;
            column.scatter(target, &gaps, evaluated.require(target)?)?;

            let model_products = self.source.model().products();
            self.products
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(model_products);
        }

        output.set(target.clone(), column)?;
        Ok(output)
    }

    fn sources(&self, window: &TimeRange) -> Provenance {
        self.source.model().sources(window)
    }

    fn products(&self) -> BTreeSet<String> {
        self.products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn output_width(&self, _variable: &str) -> usize {
        self.source.width()
    }
}
