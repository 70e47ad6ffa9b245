//! Simple column models.

use tracing::trace;

use super::{requested, Model};
use crate::column::{Column, ElementType, Scalar, Values};
use crate::dataset::Dataset;
use crate::error::{DatasetError, FusionResult};

/// Copies a variable under a new name.
#[derive(Debug, Clone)]
pub struct Identity {
    name: String,
    variables: [String; 1],
    required: [String; 1],
}

impl Identity {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            name: format!("Identity({target})"),
            variables: [target],
            required: [source.into()],
        }
    }
}

impl Model for Identity {
    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> &[String] {
        &self.variables
    }

    fn required_variables(&self) -> &[String] {
        &self.required
    }

    fn eval(&self, dataset: &Dataset, variables: Option<&[String]>) -> FusionResult<Dataset> {
        let mut output = Dataset::new();
        for target in requested(self, variables) {
            output.set(target, dataset.require(&self.required[0])?.clone())?;
        }
        Ok(output)
    }
}

/// Euclidean norm of a vector variable.
#[derive(Debug, Clone)]
pub struct VectorIntensity {
    name: String,
    variables: [String; 1],
    required: [String; 1],
}

impl VectorIntensity {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            name: format!("VectorIntensity({target})"),
            variables: [target],
            required: [source.into()],
        }
    }
}

impl Model for VectorIntensity {
    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> &[String] {
        &self.variables
    }

    fn required_variables(&self) -> &[String] {
        &self.required
    }

    fn eval(&self, dataset: &Dataset, variables: Option<&[String]>) -> FusionResult<Dataset> {
        let mut output = Dataset::new();
        let targets = requested(self, variables);
        if targets.is_empty() {
            return Ok(output);
        }
        let source = &self.required[0];
        let column = dataset.require(source)?;
        let values = column.as_f64().ok_or_else(|| DatasetError::TypeMismatch {
            variable: source.clone(),
            expected: ElementType::Float64,
            actual: column.element_type(),
        })?;
        let norms: Vec<f64> = values
            .chunks(column.width())
            .map(|row| row.iter().map(|x| x * x).sum::<f64>().sqrt())
            .collect();
        trace!(model = %self.name, rows = norms.len(), "evaluated");
        for target in targets {
            output.set(target, Column::from_f64(norms.clone()))?;
        }
        Ok(output)
    }
}

/// Constant text label attached to every row.
#[derive(Debug, Clone)]
pub struct Label {
    name: String,
    variables: [String; 1],
    required: [String; 1],
    value: String,
}

impl Label {
    /// Creates a label model; `time_variable` only provides the row count.
    pub fn new(variable: impl Into<String>, value: impl Into<String>, time_variable: impl Into<String>) -> Self {
        let variable = variable.into();
        Self {
            name: format!("Label({variable})"),
            variables: [variable],
            required: [time_variable.into()],
            value: value.into(),
        }
    }
}

impl Model for Label {
    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> &[String] {
        &self.variables
    }

    fn required_variables(&self) -> &[String] {
        &self.required
    }

    fn eval(&self, dataset: &Dataset, variables: Option<&[String]>) -> FusionResult<Dataset> {
        let mut output = Dataset::new();
        let rows = dataset.require(&self.required[0])?.rows();
        for target in requested(self, variables) {
            let column = Column::new(Values::repeat(&Scalar::Text(self.value.clone()), rows));
            output.set(target, column)?;
        }
        Ok(output)
    }
}
