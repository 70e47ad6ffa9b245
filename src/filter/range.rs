//! Inclusive value range filters.

use std::fmt;

use tracing::debug;

use super::{retain_rows, Filter};
use crate::column::Column;
use crate::dataset::Dataset;
use crate::error::{DatasetError, FusionResult};

fn numeric_values(variable: &str, column: &Column) -> Result<Vec<f64>, DatasetError> {
    column
        .values()
        .to_f64()
        .ok_or_else(|| DatasetError::TypeMismatch {
            variable: variable.to_string(),
            expected: crate::column::ElementType::Float64,
            actual: column.element_type(),
        })
}

/// Keeps rows whose scalar value lies in `[min, max]`. NaN never passes.
#[derive(Debug, Clone)]
pub struct ScalarRangeFilter {
    variables: [String; 1],
    min: f64,
    max: f64,
}

impl ScalarRangeFilter {
    pub fn new(variable: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            variables: [variable.into()],
            min,
            max,
        }
    }

    #[must_use]
    pub fn variable(&self) -> &str {
        &self.variables[0]
    }
}

impl fmt::Display for ScalarRangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}, {}]", self.variable(), self.min, self.max)
    }
}

impl Filter for ScalarRangeFilter {
    fn required_variables(&self) -> &[String] {
        &self.variables
    }

    fn filter(&self, dataset: &Dataset, index: Option<Vec<usize>>) -> FusionResult<Vec<usize>> {
        let column = dataset.require(self.variable())?;
        if column.width() != 1 {
            return Err(DatasetError::WidthMismatch {
                variable: self.variable().to_string(),
                expected: 1,
                actual: column.width(),
            }
            .into());
        }
        let values = numeric_values(self.variable(), column)?;
        let rows = retain_rows(values.len(), index, |row| {
            (self.min..=self.max).contains(&values[row])
        });
        debug!(filter = %self, rows = rows.len(), "range filter applied");
        Ok(rows)
    }
}

/// Keeps rows whose vector component lies in `[min, max]`.
#[derive(Debug, Clone)]
pub struct VectorComponentRangeFilter {
    variables: [String; 1],
    component: usize,
    min: f64,
    max: f64,
}

impl VectorComponentRangeFilter {
    pub fn new(variable: impl Into<String>, component: usize, min: f64, max: f64) -> Self {
        Self {
            variables: [variable.into()],
            component,
            min,
            max,
        }
    }

    #[must_use]
    pub fn variable(&self) -> &str {
        &self.variables[0]
    }
}

impl fmt::Display for VectorComponentRangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: [{}, {}]",
            self.variable(),
            self.component,
            self.min,
            self.max
        )
    }
}

impl Filter for VectorComponentRangeFilter {
    fn required_variables(&self) -> &[String] {
        &self.variables
    }

    fn filter(&self, dataset: &Dataset, index: Option<Vec<usize>>) -> FusionResult<Vec<usize>> {
        let column = dataset.require(self.variable())?;
        let width = column.width();
        if width < 2 {
            return Err(DatasetError::NotAVector {
                variable: self.variable().to_string(),
            }
            .into());
        }
        if self.component >= width {
            return Err(DatasetError::IndexOutOfBounds {
                index: self.component,
                len: width,
            }
            .into());
        }
        let values = numeric_values(self.variable(), column)?;
        let rows = retain_rows(column.rows(), index, |row| {
            (self.min..=self.max).contains(&values[row * width + self.component])
        });
        debug!(filter = %self, rows = rows.len(), "vector component filter applied");
        Ok(rows)
    }
}

/// Conjunction of scalar ranges over several variables.
#[derive(Debug, Clone)]
pub struct BoundingBoxFilter {
    variables: Vec<String>,
    filters: Vec<ScalarRangeFilter>,
}

impl BoundingBoxFilter {
    /// Creates the filter from `(variable, min, max)` triples.
    pub fn new<S: Into<String>>(bounds: impl IntoIterator<Item = (S, f64, f64)>) -> Self {
        let filters: Vec<ScalarRangeFilter> = bounds
            .into_iter()
            .map(|(variable, min, max)| ScalarRangeFilter::new(variable, min, max))
            .collect();
        Self {
            variables: filters.iter().map(|f| f.variable().to_string()).collect(),
            filters,
        }
    }
}

impl fmt::Display for BoundingBoxFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.filters.iter().map(ToString::to_string).collect();
        write!(f, "BoundingBox({})", parts.join(", "))
    }
}

impl Filter for BoundingBoxFilter {
    fn required_variables(&self) -> &[String] {
        &self.variables
    }

    fn filter(&self, dataset: &Dataset, index: Option<Vec<usize>>) -> FusionResult<Vec<usize>> {
        let mut index = index;
        for filter in &self.filters {
            index = Some(filter.filter(dataset, index)?);
        }
        Ok(index.unwrap_or_else(|| (0..dataset.len()).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Values;

    fn dataset() -> Dataset {
        let mut dataset = Dataset::new();
        dataset
            .set("F", Column::from_f64(vec![1.0, f64::NAN, 3.0, 4.0]))
            .unwrap();
        dataset
            .set("Latitude", Column::from_f64(vec![-80.0, 0.0, 10.0, 85.0]))
            .unwrap();
        dataset
            .set(
                "B_NEC",
                Column::vector(
                    Values::Float64(vec![
                        1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 3.0, 0.0, 0.0, 4.0, 0.0, 0.0,
                    ]),
                    3,
                )
                .unwrap(),
            )
            .unwrap();
        dataset
    }

    #[test]
    fn test_scalar_range_is_inclusive_and_drops_nan() {
        let filter = ScalarRangeFilter::new("F", 1.0, 3.0);
        assert_eq!(filter.filter(&dataset(), None).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_scalar_range_refines_index() {
        let filter = ScalarRangeFilter::new("F", 0.0, 10.0);
        assert_eq!(filter.filter(&dataset(), Some(vec![3, 1])).unwrap(), vec![3]);
    }

    #[test]
    fn test_scalar_range_rejects_vectors() {
        let filter = ScalarRangeFilter::new("B_NEC", 0.0, 1.0);
        assert!(filter.filter(&dataset(), None).is_err());
    }

    #[test]
    fn test_vector_component() {
        let filter = VectorComponentRangeFilter::new("B_NEC", 0, 2.0, 3.0);
        assert_eq!(filter.filter(&dataset(), None).unwrap(), vec![1, 2]);
        assert_eq!(filter.to_string(), "B_NEC[0]: [2, 3]");

        let scalar = VectorComponentRangeFilter::new("F", 0, 0.0, 1.0);
        assert!(scalar.filter(&dataset(), None).is_err());
    }

    #[test]
    fn test_bounding_box() {
        let filter = BoundingBoxFilter::new([("Latitude", -60.0, 60.0), ("F", 0.0, 10.0)]);
        assert_eq!(filter.required_variables(), &["Latitude", "F"]);
        assert_eq!(filter.filter(&dataset(), None).unwrap(), vec![2]);
    }
}
