//! Record-backed time series.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::{known_variables, resample, ChunkIter, Chunks, RecordChunks, TimeSeries};
use crate::column::{Column, ColumnAttrs, ElementType, Selection};
use crate::config::ProductParameters;
use crate::dataset::Dataset;
use crate::error::{DatasetError, FusionError, FusionResult, ValidationError};
use crate::interpolate::{slope_variable, InterpolationKind, InterpolationSettings};
use crate::source::{ProductRecord, ProductSource, Record};
use crate::storage::{ColumnReader, Extracted, StorageError};
use crate::time::{datetime_to_micros, TimeRange};

/// Declared shape of a product variable.
///
/// Extracted columns must match the declared element type and width;
/// a mismatch is a data-integrity failure and aborts the extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    /// Name of the variable inside the product, when different.
    pub source: Option<String>,
    pub element_type: ElementType,
    pub width: usize,
    pub attrs: ColumnAttrs,
}

impl VariableDefinition {
    pub fn new(name: impl Into<String>, element_type: ElementType) -> Self {
        Self {
            name: name.into(),
            source: None,
            element_type,
            width: 1,
            attrs: ColumnAttrs::default(),
        }
    }

    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_attrs(mut self, attrs: ColumnAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Name of the variable inside the product.
    #[must_use]
    pub fn source_name(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }

    fn validate(&self, column: Column) -> Result<Column, DatasetError> {
        if column.element_type() != self.element_type {
            return Err(DatasetError::TypeMismatch {
                variable: self.name.clone(),
                expected: self.element_type,
                actual: column.element_type(),
            });
        }
        if column.width() != self.width {
            return Err(DatasetError::WidthMismatch {
                variable: self.name.clone(),
                expected: self.width,
                actual: column.width(),
            });
        }
        if self.attrs == ColumnAttrs::default() {
            Ok(column)
        } else {
            Ok(column.with_attrs(self.attrs.clone()))
        }
    }
}

/// Rows of a record to be extracted.
#[derive(Debug, Clone)]
pub(crate) struct RowSpan {
    /// Record rows, ascending in time.
    pub(crate) selection: Selection,
    /// Time column restricted to the selection.
    pub(crate) times: Column,
}

impl RowSpan {
    fn empty() -> Self {
        Self {
            selection: Selection::Range(0..0),
            times: Column::from_timestamps(Vec::new()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.times.rows()
    }

    /// Applies the selection to a column covering every record row.
    pub(crate) fn select(&self, column: &Column) -> Result<Column, DatasetError> {
        match &self.selection {
            Selection::Range(range) => column.slice(range.clone()),
            other => column.take(&other.to_indices(column.rows())?),
        }
    }

    /// Smallest contiguous row range containing the selection.
    fn bounds(&self) -> Range<usize> {
        match &self.selection {
            Selection::Range(range) => range.clone(),
            Selection::Indices(indices) => match (indices.iter().min(), indices.iter().max()) {
                (Some(&low), Some(&high)) => low..high + 1,
                _ => 0..0,
            },
            Selection::All | Selection::Mask(_) => 0..0,
        }
    }
}

/// Time series read from the products of a [`ProductSource`].
pub struct ProductTimeSeries {
    source: ProductSource,
    reader: Arc<dyn ColumnReader>,
    definitions: Vec<VariableDefinition>,
    variables: Vec<String>,
    required: [String; 1],
    parameters: ProductParameters,
    settings: InterpolationSettings,
    products: Mutex<BTreeSet<String>>,
}

impl std::fmt::Debug for ProductTimeSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductTimeSeries")
            .field("source", &self.source)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

impl ProductTimeSeries {
    /// Creates the series.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` when the parameters are invalid or the
    /// time variable is not declared as a scalar timestamp.
    pub fn new(
        source: ProductSource,
        reader: Arc<dyn ColumnReader>,
        definitions: Vec<VariableDefinition>,
        parameters: ProductParameters,
    ) -> Result<Self, ValidationError> {
        parameters.validate()?;
        let time_variable = parameters.time_variable.clone();
        let time_ok = definitions.iter().any(|d| {
            d.name == time_variable && d.element_type == ElementType::Timestamp && d.width == 1
        });
        if !time_ok {
            return Err(ValidationError::InvalidParameter {
                name: "definitions".to_string(),
                reason: format!("{time_variable} must be declared as a scalar timestamp"),
            });
        }
        Ok(Self {
            variables: definitions.iter().map(|d| d.name.clone()).collect(),
            settings: parameters.interpolation_settings(),
            required: [time_variable],
            source,
            reader,
            definitions,
            parameters,
            products: Mutex::new(BTreeSet::new()),
        })
    }

    #[must_use]
    pub fn source(&self) -> &ProductSource {
        &self.source
    }

    #[must_use]
    pub fn parameters(&self) -> &ProductParameters {
        &self.parameters
    }

    #[must_use]
    pub fn definition(&self, variable: &str) -> Option<&VariableDefinition> {
        self.definitions.iter().find(|d| d.name == variable)
    }

    /// Number of records covering `window`.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub fn subset_count(&self, window: &TimeRange) -> FusionResult<usize> {
        self.source.count_records(window, self.parameters.time_tolerance)
    }

    /// Concatenated data covering `times` widened by the time overlap.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn subset_times(&self, times: &[i64], variables: Option<&[String]>) -> FusionResult<Dataset> {
        let variables = known_variables(&self.variables, variables);
        if variables.is_empty() {
            return Ok(Dataset::new());
        }
        let window = super::interpolation_window(times, self.parameters.time_overlap);
        let mut dataset = Dataset::new();
        for chunk in self.subset(&window, Some(variables.as_slice()))? {
            dataset.append(&chunk?)?;
        }
        Ok(dataset)
    }

    fn read_rows(
        &self,
        record: &ProductRecord,
        definition: &VariableDefinition,
        rows: Option<Range<usize>>,
    ) -> Result<Extracted, StorageError> {
        self.reader.read(record, definition.source_name(), rows)
    }

    fn require_definition(&self, variable: &str) -> Result<&VariableDefinition, DatasetError> {
        self.definition(variable).ok_or_else(|| DatasetError::MissingVariable {
            variable: variable.to_string(),
        })
    }

    /// Reads `variables` for every row of `record`, in storage order.
    ///
    /// Values cached per product are aligned with this order.
    ///
    /// # Errors
    ///
    /// Fails for undeclared variables, read failures and columns not
    /// matching their definitions.
    pub fn read_product(&self, record: &ProductRecord, variables: &[String]) -> FusionResult<Dataset> {
        let definition = self.require_definition(&self.required[0])?;
        let times = match self.read_rows(record, definition, None)? {
            Extracted::Rows(column) | Extracted::Constant(column) => definition.validate(column)?,
        };
        let span = RowSpan {
            selection: Selection::Range(0..times.rows()),
            times,
        };
        self.extract(record, variables, &span)
    }

    /// Finds the rows of `record` inside its span.
    ///
    /// Sorted products are cut by binary search; unsorted ones are
    /// ordered by a stable sort of their timestamps first.
    pub(crate) fn locate(&self, record: &Record) -> FusionResult<RowSpan> {
        let definition = self.require_definition(&self.required[0])?;
        let column = match self.read_rows(&record.payload, definition, None)? {
            Extracted::Rows(column) | Extracted::Constant(column) => definition.validate(column)?,
        };
        let times = column.as_timestamps().unwrap_or_default();
        let (start, end) = (datetime_to_micros(record.start), datetime_to_micros(record.end));

        let selection = if record.payload.sorted {
            let low = times.partition_point(|&t| t < start);
            let high = times.partition_point(|&t| t < end);
            Selection::Range(low..high.max(low))
        } else {
            let mut order: Vec<usize> = (0..times.len()).collect();
            order.sort_by_key(|&row| times[row]);
            let low = order.partition_point(|&row| times[row] < start);
            let high = order.partition_point(|&row| times[row] < end);
            Selection::Indices(order[low..high.max(low)].to_vec())
        };
        let span_times = match &selection {
            Selection::Range(range) => column.slice(range.clone())?,
            other => column.take(&other.to_indices(column.rows())?)?,
        };
        Ok(RowSpan {
            selection,
            times: span_times,
        })
    }

    /// Reads `variables` for the rows of `span`.
    pub(crate) fn extract(
        &self,
        record: &ProductRecord,
        variables: &[String],
        span: &RowSpan,
    ) -> FusionResult<Dataset> {
        let rows = span.len();
        let bounds = span.bounds();
        let mut dataset = Dataset::new();
        for variable in variables {
            if *variable == self.required[0] {
                dataset.set(variable.clone(), span.times.clone())?;
                continue;
            }
            let definition = self.require_definition(variable)?;
            let column = match self.read_rows(record, definition, Some(bounds.clone()))? {
                Extracted::Constant(value) => value.broadcast(variable, rows)?,
                Extracted::Rows(column) => match &span.selection {
                    Selection::Range(_) => column,
                    other => {
                        let shifted: Vec<usize> = other
                            .to_indices(bounds.end)?
                            .into_iter()
                            .map(|row| row - bounds.start)
                            .collect();
                        column.take(&shifted)?
                    }
                },
            };
            dataset.set(variable.clone(), definition.validate(column)?)?;
        }
        Ok(dataset)
    }

    pub(crate) fn record_product(&self, identifier: &str) {
        self.products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identifier.to_string());
    }

    /// Rows-free dataset typed after a sample product.
    pub(crate) fn empty_dataset(&self, variables: &[String]) -> FusionResult<Dataset> {
        let sample = self
            .source
            .sample_record()?
            .ok_or_else(|| FusionError::EmptyCollection {
                collection: self.source.identifier().to_string(),
            })?;
        debug!(series = self.source.identifier(), template = %sample.identifier, "empty dataset");
        self.extract(&sample, variables, &RowSpan::empty())
    }

    /// Variables to read for interpolating `variables`, including the
    /// time variable and available slopes of cubic variables.
    fn working_variables(&self, variables: &[String]) -> Vec<String> {
        let mut working = vec![self.required[0].clone()];
        for variable in variables {
            if !working.contains(variable) {
                working.push(variable.clone());
            }
            if self.settings.kind_of(variable) == InterpolationKind::Cubic {
                let slope = slope_variable(variable);
                if self.definition(&slope).is_some() && !working.contains(&slope) {
                    working.push(slope);
                }
            }
        }
        working
    }
}

impl RecordChunks for ProductTimeSeries {
    fn read_chunk(&self, record: &Record, variables: &[String]) -> FusionResult<Dataset> {
        let span = self.locate(record)?;
        let dataset = self.extract(&record.payload, variables, &span)?;
        self.record_product(record.identifier());
        debug!(
            product = record.identifier(),
            span = %record.time_range(),
            rows = dataset.len(),
            "product chunk"
        );
        Ok(dataset)
    }

    fn empty_chunk(&self, variables: &[String]) -> FusionResult<Dataset> {
        self.empty_dataset(variables)
    }
}

impl TimeSeries for ProductTimeSeries {
    fn identifier(&self) -> &str {
        self.source.identifier()
    }

    fn time_variable(&self) -> &str {
        &self.required[0]
    }

    fn variables(&self) -> &[String] {
        &self.variables
    }

    fn required_variables(&self) -> &[String] {
        &self.required
    }

    fn subset<'a>(&'a self, window: &TimeRange, variables: Option<&[String]>) -> FusionResult<Chunks<'a>> {
        let variables = known_variables(&self.variables, variables);
        if variables.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }
        debug!(series = self.identifier(), window = %window, variables = ?variables, "subset");
        let records = self
            .source
            .iter_records(window, self.parameters.time_tolerance)?;
        Ok(Box::new(ChunkIter::new(self, records, variables)))
    }

    fn interpolate(&self, times: &[i64], variables: Option<&[String]>) -> FusionResult<Dataset> {
        let variables = known_variables(&self.variables, variables);
        if times.is_empty() && self.source.sample_record()?.is_none() {
            return Ok(Dataset::new());
        }
        let working = self.working_variables(&variables);
        resample(
            self,
            times,
            &variables,
            &working,
            self.parameters.time_overlap,
            &self.settings,
        )
    }

    fn products(&self) -> BTreeSet<String> {
        self.products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
