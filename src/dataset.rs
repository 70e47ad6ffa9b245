//! Ordered column container.
//!
//! A [`Dataset`] maps unique variable names to [`Column`]s in insertion
//! order. Every column has the same number of rows; a dataset without
//! columns has zero rows.

use std::sync::Arc;

use tracing::trace;

use crate::column::{Column, ElementType, Selection};
use crate::error::{DatasetError, FusionResult};
use crate::filter::Filter;
use crate::interpolate::{slope_variable, Interp1D, InterpolationSettings};

/// Ordered mapping of variable names to equally long columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<(String, Column)>,
}

impl Dataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows (0 without columns).
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.rows())
    }

    /// True when the dataset holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the dataset holds no variables at all.
    #[must_use]
    pub fn has_variables(&self) -> bool {
        !self.columns.is_empty()
    }

    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn contains(&self, variable: &str) -> bool {
        self.position(variable).is_some()
    }

    /// True when every name in `variables` is present.
    pub fn contains_all<S: AsRef<str>>(&self, variables: &[S]) -> bool {
        variables.iter().all(|v| self.contains(v.as_ref()))
    }

    #[must_use]
    pub fn get(&self, variable: &str) -> Option<&Column> {
        self.position(variable).map(|i| &self.columns[i].1)
    }

    /// Returns the column or a `MissingVariable` error.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::MissingVariable` when absent.
    pub fn require(&self, variable: &str) -> Result<&Column, DatasetError> {
        self.get(variable).ok_or_else(|| DatasetError::MissingVariable {
            variable: variable.to_string(),
        })
    }

    /// Variable names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(name, column)| (name.as_str(), column))
    }

    /// Timestamps of the time variable.
    ///
    /// # Errors
    ///
    /// Fails when the variable is absent or not a timestamp column.
    pub fn times(&self, time_variable: &str) -> Result<&[i64], DatasetError> {
        let column = self.require(time_variable)?;
        column.as_timestamps().ok_or_else(|| DatasetError::TypeMismatch {
            variable: time_variable.to_string(),
            expected: ElementType::Timestamp,
            actual: column.element_type(),
        })
    }

    fn position(&self, variable: &str) -> Option<usize> {
        self.columns.iter().position(|(name, _)| name == variable)
    }

    /// Sets a variable, replacing an existing one in place.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::LengthMismatch` if the row count differs from
    /// the other columns.
    pub fn set(&mut self, variable: impl Into<String>, column: Column) -> Result<(), DatasetError> {
        let variable = variable.into();
        let position = self.position(&variable);
        let others = self
            .columns
            .iter()
            .enumerate()
            .find(|(i, _)| Some(*i) != position)
            .map(|(_, (_, c))| c.rows());
        if let Some(expected) = others {
            if expected != column.rows() {
                return Err(DatasetError::LengthMismatch {
                    variable,
                    expected,
                    actual: column.rows(),
                });
            }
        }
        match position {
            Some(i) => self.columns[i].1 = column,
            None => self.columns.push((variable, column)),
        }
        Ok(())
    }

    pub fn remove(&mut self, variable: &str) -> Option<Column> {
        self.position(variable).map(|i| self.columns.remove(i).1)
    }

    fn check_length(&self, other: &Self) -> Result<(), DatasetError> {
        if self.has_variables() && other.has_variables() && self.len() != other.len() {
            return Err(DatasetError::LengthMismatch {
                variable: other.names().next().unwrap_or_default().to_string(),
                expected: self.len(),
                actual: other.len(),
            });
        }
        Ok(())
    }

    /// Adds the variables of `other` that are not present yet.
    ///
    /// Existing variables are never replaced.
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` if both datasets have variables and their
    /// row counts differ.
    pub fn merge(&mut self, other: &Self) -> Result<(), DatasetError> {
        self.merge_mapped(other, &[])
    }

    /// Like [`merge`](Self::merge) with source variables renamed by the
    /// `(source, target)` pairs of `mapping`.
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` on differing row counts.
    pub fn merge_mapped(&mut self, other: &Self, mapping: &[(&str, &str)]) -> Result<(), DatasetError> {
        self.check_length(other)?;
        for (name, column) in other.iter() {
            let target = mapping
                .iter()
                .find(|(source, _)| *source == name)
                .map_or(name, |(_, target)| *target);
            if !self.contains(target) {
                self.set(target, column.clone())?;
            }
        }
        Ok(())
    }

    /// Adds or replaces every variable of `other`.
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` on differing row counts.
    pub fn update(&mut self, other: &Self) -> Result<(), DatasetError> {
        self.check_length(other)?;
        for (name, column) in other.iter() {
            self.set(name, column.clone())?;
        }
        Ok(())
    }

    /// Appends the rows of a dataset with the same variables.
    ///
    /// A dataset without variables is ignored; appending to a dataset
    /// without variables copies `other`.
    ///
    /// # Errors
    ///
    /// Fails if the variable sets, element types or widths differ.
    pub fn append(&mut self, other: &Self) -> Result<(), DatasetError> {
        if !other.has_variables() {
            return Ok(());
        }
        if !self.has_variables() {
            return self.update(other);
        }
        let missing: Vec<String> = self
            .names()
            .filter(|name| !other.contains(name))
            .map(str::to_string)
            .collect();
        let unexpected: Vec<String> = other
            .names()
            .filter(|name| !self.contains(name))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(DatasetError::VariablesMismatch {
                missing,
                unexpected,
            });
        }
        for (name, column) in &self.columns {
            if let Some(incoming) = other.get(name) {
                column.check_compatible(name, incoming)?;
            }
        }
        for (name, column) in &mut self.columns {
            if let Some(incoming) = other.get(name) {
                column.append(name, incoming)?;
            }
        }
        Ok(())
    }

    /// Appends keeping only the variables present in both datasets.
    ///
    /// # Errors
    ///
    /// Fails if a shared variable differs in element type or width.
    pub fn append_compatible(&mut self, other: &Self) -> Result<(), DatasetError> {
        if !other.has_variables() {
            return Ok(());
        }
        if !self.has_variables() {
            return self.update(other);
        }
        self.columns.retain(|(name, _)| other.contains(name));
        let shared = other.extract(&self.names().map(str::to_string).collect::<Vec<_>>());
        self.append(&shared)
    }

    /// Returns a new dataset with the selected rows.
    ///
    /// # Errors
    ///
    /// Fails for a mask of the wrong length or an out-of-range index.
    pub fn subset(&self, selection: &Selection) -> Result<Self, DatasetError> {
        if selection.selects_all(self.len()) {
            return Ok(self.clone());
        }
        let rows = selection.to_indices(self.len())?;
        let columns = self
            .columns
            .iter()
            .map(|(name, column)| Ok((name.clone(), column.take(&rows)?)))
            .collect::<Result<Vec<_>, DatasetError>>()?;
        Ok(Self { columns })
    }

    /// Consuming variant of [`subset`](Self::subset) that hands back the
    /// dataset itself when every row is selected.
    ///
    /// # Errors
    ///
    /// Same as [`subset`](Self::subset).
    pub fn into_subset(self, selection: &Selection) -> Result<Self, DatasetError> {
        if selection.selects_all(self.len()) {
            return Ok(self);
        }
        self.subset(selection)
    }

    /// Returns a dataset with the listed variables in the listed order.
    ///
    /// Unknown names are silently ignored, duplicates are taken once.
    #[must_use]
    pub fn extract<S: AsRef<str>>(&self, variables: &[S]) -> Self {
        let mut columns: Vec<(String, Column)> = Vec::new();
        for variable in variables {
            let variable = variable.as_ref();
            if columns.iter().any(|(name, _)| name == variable) {
                continue;
            }
            if let Some(column) = self.get(variable) {
                columns.push((variable.to_string(), column.clone()));
            }
        }
        Self { columns }
    }

    /// Resamples the dataset onto `times` using the timestamps of
    /// `time_variable`.
    ///
    /// Only variables present in the dataset are interpolated; slope
    /// columns of requested variables are consumed, not output. A
    /// requested time variable is set to `times` itself. A dataset
    /// without rows yields missing values at every requested time.
    ///
    /// # Errors
    ///
    /// Fails when the time variable is missing or not a timestamp column,
    /// or either time array is unsorted.
    pub fn interpolate<S: AsRef<str>>(
        &self,
        times: &[i64],
        time_variable: &str,
        variables: Option<&[S]>,
        settings: &InterpolationSettings,
    ) -> FusionResult<Self> {
        let requested: Vec<&str> = match variables {
            Some(variables) => variables.iter().map(AsRef::as_ref).collect(),
            None => self.names().collect(),
        };
        let slopes: Vec<String> = requested.iter().map(|name| slope_variable(name)).collect();
        let source = self.times(time_variable)?;
        let mut interp = Interp1D::new(source, times, settings.gap_threshold, settings.segment_neighbourhood)?;

        let mut output = Self::new();
        for name in requested {
            if slopes.iter().any(|slope| slope == name) || output.contains(name) {
                continue;
            }
            let Some(column) = self.get(name) else {
                continue;
            };
            let interpolated = if name == time_variable {
                Column::from_timestamps(times.to_vec()).with_attrs(column.attrs().clone())
            } else {
                let slope = self.get(&slope_variable(name));
                interp.interpolate(name, column, slope, settings.kind_of(name))?
            };
            output.set(name, interpolated)?;
        }
        trace!(
            source_rows = source.len(),
            target_rows = times.len(),
            variables = output.variable_count(),
            "interpolated dataset"
        );
        Ok(output)
    }

    /// Applies the filters whose required variables are all present.
    ///
    /// Returns the filtered dataset and the filters that could not be
    /// applied yet. A `None` index means every row.
    ///
    /// # Errors
    ///
    /// Propagates filter failures.
    pub fn apply_filters(
        &self,
        filters: &[Arc<dyn Filter>],
        index: Option<Vec<usize>>,
    ) -> FusionResult<(Self, Vec<Arc<dyn Filter>>)> {
        let mut index = index;
        let mut remaining = Vec::new();
        for filter in filters {
            if self.contains_all(filter.required_variables()) {
                index = Some(filter.filter(self, index)?);
            } else {
                remaining.push(Arc::clone(filter));
            }
        }
        let dataset = match index {
            None => self.clone(),
            Some(rows) => self.subset(&Selection::Indices(rows))?,
        };
        Ok((dataset, remaining))
    }
}

impl FromIterator<(String, Column)> for Dataset {
    /// Collects columns; later duplicates replace earlier ones.
    fn from_iter<T: IntoIterator<Item = (String, Column)>>(iter: T) -> Self {
        let mut dataset = Self::new();
        for (name, column) in iter {
            match dataset.position(&name) {
                Some(i) => dataset.columns[i].1 = column,
                None => dataset.columns.push((name, column)),
            }
        }
        dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Values;
    use crate::interpolate::InterpolationKind;

    const S: i64 = 1_000_000;

    fn sample() -> Dataset {
        let mut dataset = Dataset::new();
        dataset
            .set("Timestamp", Column::from_timestamps(vec![0, S, 2 * S]))
            .unwrap();
        dataset
            .set("F", Column::from_f64(vec![10.0, 20.0, 30.0]))
            .unwrap();
        dataset
            .set(
                "B_NEC",
                Column::vector(
                    Values::Float64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]),
                    3,
                )
                .unwrap(),
            )
            .unwrap();
        dataset
    }

    #[test]
    fn test_set_rejects_length_mismatch() {
        let mut dataset = sample();
        let err = dataset.set("X", Column::from_f64(vec![1.0])).unwrap_err();
        assert!(matches!(err, DatasetError::LengthMismatch { expected: 3, actual: 1, .. }));
        // Replacing the only column may change the length.
        let mut single = Dataset::new();
        single.set("a", Column::from_f64(vec![1.0])).unwrap();
        single.set("a", Column::from_f64(vec![1.0, 2.0])).unwrap();
        assert_eq!(single.len(), 2);
    }

    #[test]
    fn test_append_self_doubles_rows() {
        let dataset = sample();
        let mut doubled = dataset.clone();
        doubled.append(&dataset).unwrap();
        assert_eq!(doubled.len(), 6);
        assert_eq!(
            doubled.names().collect::<Vec<_>>(),
            dataset.names().collect::<Vec<_>>()
        );
        for (name, column) in doubled.iter() {
            assert_eq!(column.element_type(), dataset.get(name).unwrap().element_type());
            assert_eq!(column.width(), dataset.get(name).unwrap().width());
        }
    }

    #[test]
    fn test_append_variables_mismatch() {
        let mut dataset = sample();
        let other = dataset.extract(&["Timestamp", "F"]);
        let err = dataset.append(&other).unwrap_err();
        assert!(matches!(err, DatasetError::VariablesMismatch { .. }));
    }

    #[test]
    fn test_append_ignores_empty_and_fills_empty() {
        let mut dataset = Dataset::new();
        dataset.append(&Dataset::new()).unwrap();
        assert!(!dataset.has_variables());
        dataset.append(&sample()).unwrap();
        assert_eq!(dataset, sample());
    }

    #[test]
    fn test_append_compatible_keeps_shared_variables() {
        let mut dataset = sample();
        let other = sample().extract(&["Timestamp", "F"]);
        dataset.append_compatible(&other).unwrap();
        assert_eq!(dataset.names().collect::<Vec<_>>(), vec!["Timestamp", "F"]);
        assert_eq!(dataset.len(), 6);
    }

    #[test]
    fn test_subset_all_true_mask_is_identity() {
        let dataset = sample();
        let subset = dataset.subset(&Selection::Mask(vec![true; 3])).unwrap();
        assert_eq!(subset, dataset);
    }

    #[test]
    fn test_subset_moves_vector_rows() {
        let subset = sample().subset(&Selection::Indices(vec![2, 0])).unwrap();
        assert_eq!(subset.len(), 2);
        assert_eq!(
            subset.get("B_NEC").unwrap().as_f64().unwrap(),
            &[7.0, 8.0, 9.0, 1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_merge_never_replaces() {
        let mut dataset = sample();
        let mut other = Dataset::new();
        other.set("F", Column::from_f64(vec![0.0; 3])).unwrap();
        other.set("Kp", Column::from_f64(vec![1.0; 3])).unwrap();
        dataset.merge(&other).unwrap();
        assert_eq!(dataset.get("F").unwrap().as_f64().unwrap(), &[10.0, 20.0, 30.0]);
        assert!(dataset.contains("Kp"));
        assert_eq!(dataset.names().last(), Some("Kp"));
    }

    #[test]
    fn test_merge_mapped_renames() {
        let mut dataset = sample().extract(&["Timestamp"]);
        dataset.merge_mapped(&sample(), &[("F", "F_model")]).unwrap();
        assert!(dataset.contains("F_model"));
        assert!(!dataset.contains("F"));
    }

    #[test]
    fn test_update_replaces() {
        let mut dataset = sample();
        let mut other = Dataset::new();
        other.set("F", Column::from_f64(vec![0.0; 3])).unwrap();
        dataset.update(&other).unwrap();
        assert_eq!(dataset.get("F").unwrap().as_f64().unwrap(), &[0.0; 3]);
        assert_eq!(dataset.names().nth(1), Some("F"));
    }

    #[test]
    fn test_extract_ignores_unknown() {
        let extracted = sample().extract(&["F", "nope", "F", "Timestamp"]);
        assert_eq!(extracted.names().collect::<Vec<_>>(), vec!["F", "Timestamp"]);
    }

    #[test]
    fn test_interpolate_copies_time_and_skips_slopes() {
        let mut dataset = sample();
        dataset
            .set("_d_F_dt", Column::from_f64(vec![10.0, 10.0, 10.0]))
            .unwrap();
        let mut settings = InterpolationSettings {
            gap_threshold: 10 * S,
            ..InterpolationSettings::default()
        };
        settings.kinds.insert("F".to_string(), InterpolationKind::Cubic);
        let times = [S / 2, 3 * S / 2];
        let out = dataset
            .interpolate(&times, "Timestamp", Some(&["Timestamp", "F", "_d_F_dt"][..]), &settings)
            .unwrap();
        assert_eq!(out.names().collect::<Vec<_>>(), vec!["Timestamp", "F"]);
        assert_eq!(out.times("Timestamp").unwrap(), &times);
        let f = out.get("F").unwrap().as_f64().unwrap();
        assert!((f[0] - 15.0).abs() < 1e-9);
        assert!((f[1] - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_empty_dataset_fills_missing() {
        let empty = sample().subset(&Selection::Indices(vec![])).unwrap();
        let out = empty
            .interpolate(&[0, S], "Timestamp", Some(&["F", "B_NEC"][..]), &InterpolationSettings::default())
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.get("F").unwrap().as_f64().unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(out.get("B_NEC").unwrap().width(), 3);
    }
}
