//! Model values served per record.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::product::{ProductTimeSeries, RowSpan};
use super::{known_variables, resample, ChunkIter, Chunks, RecordChunks, TimeSeries};
use crate::column::{Column, ElementType, Scalar};
use crate::dataset::Dataset;
use crate::error::{DatasetError, FusionResult};
use crate::interpolate::{InterpolationKind, InterpolationSettings};
use crate::model::SourceModel;
use crate::source::Record;
use crate::storage::CacheStore;
use crate::time::TimeRange;

/// Where model values come from.
#[derive(Clone)]
pub enum ModelSeriesMode {
    /// Read from the per-record cache; stale or absent entries are left
    /// missing (NaN) for a later gap fill.
    Cached(Arc<dyn CacheStore>),
    /// Evaluated per record at the record's own sample locations.
    Live,
}

impl std::fmt::Debug for ModelSeriesMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cached(_) => f.write_str("Cached"),
            Self::Live => f.write_str("Live"),
        }
    }
}

/// Time series of model values at the sample locations of a product
/// collection.
///
/// Each model variable is published under its intermediate name
/// (`__intermediate__{variable}`); [`ModelGapFill`](crate::model::ModelGapFill)
/// turns it into the final variable.
#[derive(Debug)]
pub struct ModelSeries {
    series: Arc<ProductTimeSeries>,
    models: Vec<SourceModel>,
    mode: ModelSeriesMode,
    variables: Vec<String>,
    required: [String; 1],
    interpolation_kind: InterpolationKind,
    is_master: bool,
    products: Mutex<BTreeSet<String>>,
}

impl ModelSeries {
    pub fn new(series: Arc<ProductTimeSeries>, models: Vec<SourceModel>, mode: ModelSeriesMode) -> Self {
        let time_variable = series.time_variable().to_string();
        let variables = std::iter::once(time_variable.clone())
            .chain(models.iter().map(|m| m.intermediate().to_string()))
            .collect();
        Self {
            series,
            models,
            mode,
            variables,
            required: [time_variable],
            interpolation_kind: InterpolationKind::Nearest,
            is_master: false,
            products: Mutex::new(BTreeSet::new()),
        }
    }

    /// Sets the interpolation kind of the model variables.
    ///
    /// Ignored when the series reads the master collection.
    #[must_use]
    pub fn with_interpolation_kind(mut self, kind: InterpolationKind) -> Self {
        self.interpolation_kind = kind;
        self
    }

    /// Marks the series as reading the master collection when the
    /// identifiers match. Sample locations then coincide with the
    /// interpolated times and nearest-sample interpolation is used.
    #[must_use]
    pub fn with_master(mut self, master_identifier: &str) -> Self {
        self.is_master = master_identifier == self.series.identifier();
        if self.is_master {
            debug!(series = self.series.identifier(), "using master collection");
        }
        self
    }

    /// Effective interpolation kind of the model variables.
    #[must_use]
    pub fn interpolation_kind(&self) -> InterpolationKind {
        if self.is_master {
            InterpolationKind::Nearest
        } else {
            self.interpolation_kind
        }
    }

    fn settings(&self) -> InterpolationSettings {
        self.series
            .parameters()
            .interpolation_settings()
            .forced(self.interpolation_kind())
    }

    fn requested_models(&self, variables: &[String]) -> Vec<&SourceModel> {
        self.models
            .iter()
            .filter(|m| variables.iter().any(|v| v == m.intermediate()))
            .collect()
    }

    /// Product variables to read: requested non-model variables, plus the
    /// model inputs when evaluating live.
    fn product_variables(&self, variables: &[String], models: &[&SourceModel]) -> Vec<String> {
        let mut product_variables: Vec<String> = variables
            .iter()
            .filter(|v| !models.iter().any(|m| m.intermediate() == v.as_str()))
            .cloned()
            .collect();
        if matches!(self.mode, ModelSeriesMode::Live) {
            for model in models {
                for input in model.model().required_variables() {
                    if self.series.definition(input).is_some() && !product_variables.contains(input) {
                        product_variables.push(input.clone());
                    }
                }
            }
        }
        product_variables
    }

    fn record_products(&self, products: impl IntoIterator<Item = String>) {
        self.products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(products);
    }

    fn missing(model: &SourceModel, rows: usize) -> Column {
        Column::filled(&Scalar::Float64(f64::NAN), rows, model.width())
    }

    /// Cached values of `model` for the rows of `span`, if the entry
    /// exists and still matches the sources the model reports.
    fn cached_column(
        &self,
        cache: &dyn CacheStore,
        record: &Record,
        model: &SourceModel,
        span: &RowSpan,
    ) -> FusionResult<Option<Column>> {
        let identifier = record.identifier();
        let Some(provenance) = cache.read_provenance(identifier, model.name())? else {
            debug!(product = identifier, model = model.name(), "cached model values missing");
            return Ok(None);
        };
        let window = record.time_range();
        if !model.is_current(&provenance, &window) {
            warn!(
                product = identifier,
                model = model.name(),
                "obsolete cached model values detected"
            );
            return Ok(None);
        }
        let Some(column) = cache.read_column(identifier, model.name())? else {
            return Ok(None);
        };
        if column.element_type() != ElementType::Float64 {
            return Err(DatasetError::TypeMismatch {
                variable: model.intermediate().to_string(),
                expected: ElementType::Float64,
                actual: column.element_type(),
            }
            .into());
        }
        if column.width() != model.width() {
            return Err(DatasetError::WidthMismatch {
                variable: model.intermediate().to_string(),
                expected: model.width(),
                actual: column.width(),
            }
            .into());
        }
        let column = span.select(&column)?;
        self.record_products(
            provenance
                .restricted(&window)
                .names()
                .into_iter()
                .map(str::to_string),
        );
        Ok(Some(column))
    }
}

impl RecordChunks for ModelSeries {
    fn read_chunk(&self, record: &Record, variables: &[String]) -> FusionResult<Dataset> {
        let models = self.requested_models(variables);
        let span = self.series.locate(record)?;
        let mut dataset = self.series.extract(
            &record.payload,
            &self.product_variables(variables, &models),
            &span,
        )?;
        self.series.record_product(record.identifier());
        self.record_products([record.identifier().to_string()]);

        match &self.mode {
            ModelSeriesMode::Live => {
                for model in &models {
                    let evaluated = model
                        .model()
                        .eval(&dataset, Some(&[model.variable().to_string()][..]))?;
                    dataset.merge_mapped(&evaluated, &[(model.variable(), model.intermediate())])?;
                    self.record_products(model.model().products());
                }
            }
            ModelSeriesMode::Cached(cache) => {
                for model in &models {
                    let column = match self.cached_column(cache.as_ref(), record, model, &span)? {
                        Some(column) => column,
                        None => Self::missing(model, span.len()),
                    };
                    dataset.set(model.intermediate(), column)?;
                }
            }
        }
        debug!(
            product = record.identifier(),
            mode = ?self.mode,
            rows = dataset.len(),
            "model chunk"
        );
        Ok(dataset.extract(variables))
    }

    fn empty_chunk(&self, variables: &[String]) -> FusionResult<Dataset> {
        let models = self.requested_models(variables);
        let product_variables: Vec<String> = variables
            .iter()
            .filter(|v| !models.iter().any(|m| m.intermediate() == v.as_str()))
            .cloned()
            .collect();
        let mut dataset = self.series.empty_dataset(&product_variables)?;
        for model in models {
            dataset.set(model.intermediate(), Self::missing(model, 0))?;
        }
        Ok(dataset.extract(variables))
    }
}

impl TimeSeries for ModelSeries {
    fn identifier(&self) -> &str {
        self.series.identifier()
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
        let records = self
            .series
            .source()
            .iter_records(window, self.series.parameters().time_tolerance)?;
        Ok(Box::new(ChunkIter::new(self, records, variables)))
    }

    fn interpolate(&self, times: &[i64], variables: Option<&[String]>) -> FusionResult<Dataset> {
        let variables = known_variables(&self.variables, variables);
        let mut working = vec![self.required[0].clone()];
        working.extend(variables.iter().filter(|v| **v != self.required[0]).cloned());
        resample(
            self,
            times,
            &variables,
            &working,
            self.series.parameters().time_overlap,
            &self.settings(),
        )
    }

    fn products(&self) -> BTreeSet<String> {
        self.products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
