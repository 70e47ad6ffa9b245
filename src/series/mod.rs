//! Time series.
//!
//! A time series streams [`Dataset`] chunks for a time window (one chunk
//! per resolved record) and resamples its variables onto arbitrary
//! timestamps. Chunks are produced lazily: pulling a chunk performs the
//! I/O of exactly one record.

mod merged;
mod model;
mod product;

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

pub use merged::MergedTimeSeries;
pub use model::{ModelSeries, ModelSeriesMode};
pub use product::{ProductTimeSeries, VariableDefinition};

use crate::dataset::Dataset;
use crate::error::FusionResult;
use crate::interpolate::InterpolationSettings;
use crate::source::{Record, RecordIter};
use crate::time::{micros_to_datetime, TimeRange};

/// Lazy sequence of dataset chunks.
pub type Chunks<'a> = Box<dyn Iterator<Item = FusionResult<Dataset>> + 'a>;

/// Chunked, resamplable source of variables.
pub trait TimeSeries: Send + Sync {
    /// Identifier used in logs.
    fn identifier(&self) -> &str;

    /// Name of the timestamp variable.
    fn time_variable(&self) -> &str;

    /// Variables the series provides, including the time variable.
    fn variables(&self) -> &[String];

    /// Variables needed to align the series to another one.
    fn required_variables(&self) -> &[String];

    /// Streams the requested variables (all when `None`) over `window`.
    ///
    /// A non-empty collection yields at least one, possibly empty, chunk so
    /// that column types are always known. Unknown variables are ignored;
    /// nothing is yielded when no known variable is requested.
    ///
    /// # Errors
    ///
    /// Listing failures are returned immediately, read failures through
    /// the iterator.
    fn subset<'a>(&'a self, window: &TimeRange, variables: Option<&[String]>) -> FusionResult<Chunks<'a>>;

    /// Resamples the requested variables onto `times` (ascending epoch
    /// microseconds).
    ///
    /// # Errors
    ///
    /// Propagates read and interpolation failures.
    fn interpolate(&self, times: &[i64], variables: Option<&[String]>) -> FusionResult<Dataset>;

    /// Identifiers of the products read so far.
    fn products(&self) -> BTreeSet<String>;
}

/// Requested variables known to the series, in request order, once each.
pub(crate) fn known_variables(provided: &[String], requested: Option<&[String]>) -> Vec<String> {
    let Some(requested) = requested else {
        return provided.to_vec();
    };
    let mut variables: Vec<String> = Vec::with_capacity(requested.len());
    for variable in requested {
        if provided.contains(variable) && !variables.contains(variable) {
            variables.push(variable.clone());
        }
    }
    variables
}

/// Reads one chunk per record.
pub(crate) trait RecordChunks: Sync {
    fn read_chunk(&self, record: &Record, variables: &[String]) -> FusionResult<Dataset>;

    /// Correctly typed chunk without rows.
    fn empty_chunk(&self, variables: &[String]) -> FusionResult<Dataset>;
}

/// Iterator reading records on demand.
pub(crate) struct ChunkIter<'a, S: RecordChunks> {
    reader: &'a S,
    records: RecordIter,
    variables: Vec<String>,
    yielded: usize,
    finished: bool,
}

impl<'a, S: RecordChunks> ChunkIter<'a, S> {
    pub(crate) fn new(reader: &'a S, records: RecordIter, variables: Vec<String>) -> Self {
        Self {
            reader,
            records,
            variables,
            yielded: 0,
            finished: false,
        }
    }
}

impl<S: RecordChunks> Iterator for ChunkIter<'_, S> {
    type Item = FusionResult<Dataset>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = match self.records.next() {
            Some(record) => self.reader.read_chunk(&record, &self.variables),
            None if self.yielded == 0 => {
                self.finished = true;
                self.reader.empty_chunk(&self.variables)
            }
            None => {
                self.finished = true;
                return None;
            }
        };
        self.yielded += 1;
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

/// Window read around `times` before resampling.
///
/// The window spans the requested times widened by `overlap` and includes
/// the last requested time. Empty `times` give an empty window.
pub(crate) fn interpolation_window(times: &[i64], overlap: Duration) -> TimeRange {
    match (times.first(), times.last()) {
        (Some(&first), Some(&last)) => TimeRange {
            start: micros_to_datetime(first) - overlap,
            end: micros_to_datetime(last) + overlap + Duration::microseconds(1),
        },
        _ => TimeRange {
            start: DateTime::<Utc>::UNIX_EPOCH,
            end: DateTime::<Utc>::UNIX_EPOCH,
        },
    }
}

/// Concatenates the chunks of `series` covering `times` and resamples
/// `variables` onto `times`.
pub(crate) fn resample(
    series: &dyn TimeSeries,
    times: &[i64],
    variables: &[String],
    working_variables: &[String],
    overlap: Duration,
    settings: &InterpolationSettings,
) -> FusionResult<Dataset> {
    if variables.is_empty() {
        return Ok(Dataset::new());
    }
    let window = interpolation_window(times, overlap);
    let mut working = Dataset::new();
    for chunk in series.subset(&window, Some(working_variables))? {
        working.append(&chunk?)?;
    }
    debug!(
        series = series.identifier(),
        window = %window,
        source_rows = working.len(),
        target_rows = times.len(),
        "resampling"
    );
    if !working.has_variables() {
        return Ok(working);
    }
    working.interpolate(times, series.time_variable(), Some(variables), settings)
}
