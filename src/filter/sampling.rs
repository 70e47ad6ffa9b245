//! Temporal sub-sampling.

use std::fmt;

use chrono::Duration;
use tracing::debug;

use super::Filter;
use crate::column::ElementType;
use crate::dataset::Dataset;
use crate::error::{DatasetError, FusionResult, ValidationError};
use crate::time::duration_to_micros;

/// Keeps the first row of every `min_step` bucket counted from a base value.
///
/// Rows are bucketed by `trunc((value - base) / min_step)`; a row passes
/// when its bucket differs from the bucket of the preceding candidate row.
/// Without an explicit base the first considered value is used.
#[derive(Debug, Clone)]
pub struct MinStepSampler {
    variables: [String; 1],
    min_step: f64,
    base_value: Option<f64>,
}

impl MinStepSampler {
    /// Creates a sampler over a numeric variable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` unless `min_step` is positive and finite.
    pub fn new(
        variable: impl Into<String>,
        min_step: f64,
        base_value: Option<f64>,
    ) -> Result<Self, ValidationError> {
        if !(min_step.is_finite() && min_step > 0.0) {
            return Err(ValidationError::InvalidParameter {
                name: "min_step".to_string(),
                reason: format!("must be positive, got {min_step}"),
            });
        }
        Ok(Self {
            variables: [variable.into()],
            min_step,
            base_value,
        })
    }

    /// Creates a sampler over a timestamp variable with a time step.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a non-positive step.
    #[allow(clippy::cast_precision_loss)]
    pub fn for_time(variable: impl Into<String>, min_step: Duration) -> Result<Self, ValidationError> {
        Self::new(variable, duration_to_micros(min_step) as f64, None)
    }

    #[must_use]
    pub fn variable(&self) -> &str {
        &self.variables[0]
    }

    #[allow(clippy::cast_possible_truncation)]
    fn bucket(&self, value: f64, base: f64) -> i64 {
        ((value - base) / self.min_step) as i64
    }
}

impl fmt::Display for MinStepSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MinStepSampler({}, {}", self.variable(), self.min_step)?;
        if let Some(base) = self.base_value {
            write!(f, ", {base}")?;
        }
        f.write_str(")")
    }
}

impl Filter for MinStepSampler {
    fn required_variables(&self) -> &[String] {
        &self.variables
    }

    fn filter(&self, dataset: &Dataset, index: Option<Vec<usize>>) -> FusionResult<Vec<usize>> {
        let column = dataset.require(self.variable())?;
        let values = column
            .values()
            .to_f64()
            .ok_or_else(|| DatasetError::TypeMismatch {
                variable: self.variable().to_string(),
                expected: ElementType::Timestamp,
                actual: column.element_type(),
            })?;
        let candidates = index.unwrap_or_else(|| (0..values.len()).collect());
        let Some(&first) = candidates.first() else {
            return Ok(Vec::new());
        };
        let base = self.base_value.unwrap_or(values[first]);

        let mut rows = Vec::new();
        let mut previous: Option<i64> = None;
        for row in candidates {
            let bucket = self.bucket(values[row], base);
            if previous != Some(bucket) {
                rows.push(row);
            }
            previous = Some(bucket);
        }
        debug!(filter = %self, rows = rows.len(), "sampler applied");
        Ok(rows)
    }
}
