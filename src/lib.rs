//! # timefuse - Time-Series Fusion for Product Archives
//!
//! timefuse merges the variables of time-stamped products from several
//! collections into one stream of datasets aligned to a master timeline.
//! Slave series are interpolated onto the master times, derived variables
//! come from models (live or from a per-product cache), and filters narrow
//! the rows, all evaluated lazily one product at a time.
//!
//! ## Core Concepts
//!
//! - **Dataset**: ordered named columns sharing one row count
//! - **ProductSource**: the non-overlapping records covering a time window,
//!   resolved across collections by priority
//! - **TimeSeries**: chunked, resamplable access to the variables of a source
//! - **VariableResolver**: the minimal producer/consumer graph for a request
//! - **Pipeline**: chunk-by-chunk evaluation of a resolved request
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use timefuse::{Pipeline, PipelineConfig, TimeRange, VariableResolver};
//!
//! let mut resolver = VariableResolver::new();
//! resolver.add_master(magnetic)?;
//! resolver.add_slave(indices)?;
//! resolver.add_model(Arc::new(VectorIntensity::new("B_NEC", "F")));
//! resolver.add_filter(Arc::new(ScalarRangeFilter::new("Kp", 0.0, 3.0)));
//! resolver.add_output_variables(None);
//!
//! let pipeline = Pipeline::new(resolver, PipelineConfig::default());
//! for chunk in pipeline.evaluate(&window)? {
//!     write_rows(&chunk?)?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod column;
pub mod config;
pub mod dataset;
pub mod error;
pub mod interpolate;
pub mod provenance;
pub mod time;

// Sources, storage and series
pub mod series;
pub mod source;
pub mod storage;

// Models, filters and evaluation
pub mod filter;
pub mod maintenance;
pub mod model;
pub mod pipeline;
pub mod resolver;

// Re-export primary types at crate root for convenience
pub use column::{Column, ColumnAttrs, ElementType, Scalar, Selection, Values};
pub use config::{FusionConfig, MaintenanceConfig, ParameterRegistry, PipelineConfig, ProductParameters};
pub use dataset::Dataset;
pub use error::{
    ConfigError, DatasetError, FusionError, FusionResult, PipelineError, ResolverError, ValidationError,
};
pub use interpolate::{InterpolationKind, InterpolationSettings};
pub use provenance::{Provenance, SourceSpan};
pub use time::TimeRange;

pub use filter::{Filter, RejectAll};
pub use maintenance::{CacheMaintenance, MaintenanceReport, RecordSelector, StreamExecutor};
pub use model::{Model, ModelCache, ModelGapFill, SourceModel};
pub use pipeline::{Pipeline, PipelineChunks};
pub use resolver::{Consumer, VariableResolver};
pub use series::{MergedTimeSeries, ModelSeries, ModelSeriesMode, ProductTimeSeries, TimeSeries, VariableDefinition};
pub use source::{ProductRecord, ProductSource, Record};
pub use storage::{CacheStore, ColumnReader, RecordRepository, StorageError};
