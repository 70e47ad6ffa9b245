//! Chunked evaluation of a resolved pipeline.
//!
//! Every master chunk flows through the same steps: filters, interpolated
//! slave variables, model outputs, the sample limit and finally the
//! restriction to the output variables. Filters are applied as soon as
//! their inputs are present so later steps work on fewer rows.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::error::{FusionResult, PipelineError, ResolverError};
use crate::filter::{describe_filters, Filter};
use crate::model::Model;
use crate::resolver::VariableResolver;
use crate::series::{Chunks, TimeSeries};
use crate::time::TimeRange;

/// Reduced resolver ready for evaluation.
#[derive(Debug)]
pub struct Pipeline {
    resolver: VariableResolver,
    config: PipelineConfig,
}

impl Pipeline {
    /// Reduces `resolver` and wraps it.
    pub fn new(mut resolver: VariableResolver, config: PipelineConfig) -> Self {
        resolver.reduce();
        Self { resolver, config }
    }

    #[must_use]
    pub fn resolver(&self) -> &VariableResolver {
        &self.resolver
    }

    #[must_use]
    pub fn output_variables(&self) -> &[String] {
        self.resolver.output_variables()
    }

    /// Streams the output chunks for `window`.
    ///
    /// # Errors
    ///
    /// Returns `NoMaster` when the resolver has no master; listing
    /// failures are returned immediately, everything else through the
    /// iterator, which stops after the first error.
    pub fn evaluate(&self, window: &TimeRange) -> FusionResult<PipelineChunks<'_>> {
        let master = self.resolver.master().ok_or(ResolverError::NoMaster)?;
        let time_variable = master.time_variable().to_string();

        let mut requested: Vec<String> = vec![time_variable.clone()];
        requested.extend(
            self.resolver
                .required()
                .into_iter()
                .filter(|v| **v != time_variable)
                .map(str::to_string),
        );
        let derived: Vec<String> = requested
            .iter()
            .filter(|v| !master.variables().contains(v))
            .cloned()
            .collect();
        debug!(
            master = master.identifier(),
            window = %window,
            requested = ?requested,
            "evaluating pipeline"
        );

        let chunks = master.subset(window, Some(requested.as_slice()))?;
        Ok(PipelineChunks {
            chunks,
            time_variable,
            derived,
            slaves: self.resolver.slaves(),
            models: self.resolver.models(),
            filters: self.resolver.filters(),
            output: self.resolver.output_variables().to_vec(),
            limit: self.config.max_samples,
            total: 0,
            finished: false,
        })
    }

    /// Evaluates `window` into a single dataset.
    ///
    /// # Errors
    ///
    /// Propagates evaluation failures.
    pub fn collect(&self, window: &TimeRange) -> FusionResult<Dataset> {
        let mut output = Dataset::new();
        for chunk in self.evaluate(window)? {
            output.append(&chunk?)?;
        }
        Ok(output)
    }
}

/// Output chunks of a pipeline.
pub struct PipelineChunks<'a> {
    chunks: Chunks<'a>,
    time_variable: String,
    /// Required variables not provided by the master.
    derived: Vec<String>,
    slaves: Vec<Arc<dyn TimeSeries>>,
    models: Vec<Arc<dyn Model>>,
    filters: Vec<Arc<dyn Filter>>,
    output: Vec<String>,
    limit: usize,
    total: usize,
    finished: bool,
}

impl PipelineChunks<'_> {
    /// Rows yielded so far.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    fn process(&mut self, dataset: Dataset) -> FusionResult<Dataset> {
        debug!(rows = dataset.len(), "chunk before filters");
        let (mut dataset, mut remaining) = dataset.apply_filters(&self.filters, None)?;

        for slave in &self.slaves {
            // Filters applied after the previous slave may have dropped rows.
            let times = dataset.times(&self.time_variable)?.to_vec();
            dataset.merge(&slave.interpolate(&times, Some(self.derived.as_slice()))?)?;
            (dataset, remaining) = dataset.apply_filters(&remaining, None)?;
        }
        for model in &self.models {
            dataset.merge(&model.eval(&dataset, Some(self.derived.as_slice()))?)?;
            (dataset, remaining) = dataset.apply_filters(&remaining, None)?;
        }
        debug!(rows = dataset.len(), "chunk after filters");

        if !remaining.is_empty() {
            return Err(PipelineError::FiltersNotApplied {
                filters: describe_filters(&remaining),
            }
            .into());
        }

        self.total += dataset.len();
        if self.total > self.limit {
            warn!(
                samples = self.total,
                limit = self.limit,
                "sample count exceeds the maximum allowed count"
            );
            return Err(PipelineError::SampleLimitExceeded { limit: self.limit }.into());
        }
        Ok(dataset.extract(&self.output))
    }
}

impl Iterator for PipelineChunks<'_> {
    type Item = FusionResult<Dataset>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let Some(chunk) = self.chunks.next() else {
            self.finished = true;
            info!(samples = self.total, variables = ?self.output, "pipeline finished");
            return None;
        };
        let result = chunk.and_then(|dataset| self.process(dataset));
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}
