//! Cache seeding, flushing and statistics.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, warn};

use super::pool::StreamExecutor;
use crate::config::MaintenanceConfig;
use crate::error::{FusionResult, ValidationError};
use crate::model::SourceModel;
use crate::series::{ProductTimeSeries, TimeSeries};
use crate::source::ProductRecord;
use crate::storage::CacheStore;
use crate::time::TimeRange;

/// Products a job works on: identifiers matching `pattern`, optionally
/// restricted to those intersecting `window`.
#[derive(Debug, Clone)]
pub struct RecordSelector {
    pub pattern: Regex,
    pub window: Option<TimeRange>,
}

impl RecordSelector {
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an invalid regular expression.
    pub fn new(pattern: &str) -> Result<Self, ValidationError> {
        let pattern = Regex::new(pattern).map_err(|e| ValidationError::InvalidParameter {
            name: "pattern".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern,
            window: None,
        })
    }

    #[must_use]
    pub fn with_window(mut self, window: TimeRange) -> Self {
        self.window = Some(window);
        self
    }

    #[must_use]
    pub fn is_match(&self, record: &ProductRecord) -> bool {
        self.pattern.is_match(&record.identifier)
    }
}

/// Outcome counts of a job, one unit per product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl MaintenanceReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }
}

impl fmt::Display for MaintenanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} skipped, {} failed",
            self.processed, self.skipped, self.failed
        )
    }
}

/// State of the cached values of one model for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Seeded,
    /// Computed from sources the model no longer uses.
    Obsolete,
    Missing,
}

/// Per-state product counts of one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounts {
    pub seeded: usize,
    pub obsolete: usize,
    pub missing: usize,
}

impl CacheCounts {
    fn add(&mut self, state: CacheState) {
        match state {
            CacheState::Seeded => self.seeded += 1,
            CacheState::Obsolete => self.obsolete += 1,
            CacheState::Missing => self.missing += 1,
        }
    }
}

/// Cache statistics keyed by model name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    pub models: BTreeMap<String, CacheCounts>,
    /// Products whose state could not be read.
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Done,
    UpToDate,
}

/// Shared state of the per-product units.
struct Context {
    series: Arc<ProductTimeSeries>,
    cache: Arc<dyn CacheStore>,
    models: Vec<SourceModel>,
}

impl Context {
    fn state(&self, record: &ProductRecord, model: &SourceModel) -> FusionResult<CacheState> {
        let Some(provenance) = self.cache.read_provenance(&record.identifier, model.name())? else {
            return Ok(CacheState::Missing);
        };
        if model.is_current(&provenance, &record.time_range()) {
            Ok(CacheState::Seeded)
        } else {
            Ok(CacheState::Obsolete)
        }
    }

    fn seed(&self, record: &ProductRecord, force: bool) -> FusionResult<Unit> {
        let mut pending = Vec::new();
        for model in &self.models {
            if force || self.state(record, model)? != CacheState::Seeded {
                pending.push(model);
            }
        }
        if pending.is_empty() {
            return Ok(Unit::UpToDate);
        }

        let mut variables = vec![self.series.time_variable().to_string()];
        for model in &pending {
            for input in model.model().required_variables() {
                if !variables.contains(input) {
                    variables.push(input.clone());
                }
            }
        }
        let inputs = self.series.read_product(record, &variables)?;
        let window = record.time_range();
        for model in pending {
            let target = model.variable().to_string();
            let evaluated = model.model().eval(&inputs, Some(std::slice::from_ref(&target)))?;
            let column = evaluated.require(&target)?.clone();
            self.cache.write(
                &record.identifier,
                model.name(),
                column,
                model.model().sources(&window),
            )?;
            debug!(product = %record.identifier, model = model.name(), rows = inputs.len(), "cache seeded");
        }
        Ok(Unit::Done)
    }

    fn flush(&self, record: &ProductRecord) -> FusionResult<Unit> {
        let mut removed = false;
        for model in &self.models {
            removed |= self.cache.remove(&record.identifier, model.name())?;
        }
        Ok(if removed { Unit::Done } else { Unit::UpToDate })
    }
}

/// Maintenance of the model values cached for the products of a series.
///
/// Each product is an independent unit of work run on the pool; a failing
/// product is logged and counted, and the job continues.
pub struct CacheMaintenance {
    context: Arc<Context>,
    executor: StreamExecutor,
}

impl fmt::Debug for CacheMaintenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheMaintenance")
            .field("series", &self.context.series.identifier())
            .field("models", &self.context.models.len())
            .field("executor", &self.executor)
            .finish()
    }
}

impl CacheMaintenance {
    /// # Errors
    ///
    /// Fails when the worker pool cannot be started.
    pub fn new(
        series: Arc<ProductTimeSeries>,
        cache: Arc<dyn CacheStore>,
        models: Vec<SourceModel>,
        config: &MaintenanceConfig,
    ) -> FusionResult<Self> {
        Ok(Self {
            context: Arc::new(Context {
                series,
                cache,
                models,
            }),
            executor: StreamExecutor::start(config)?,
        })
    }

    fn select(&self, selector: &RecordSelector) -> FusionResult<Vec<ProductRecord>> {
        let products = self
            .context
            .series
            .source()
            .list_products(selector.window.as_ref())?;
        Ok(products.into_iter().filter(|p| selector.is_match(p)).collect())
    }

    fn run<F>(&self, job: &str, selector: &RecordSelector, unit: F) -> FusionResult<MaintenanceReport>
    where
        F: Fn(&Context, &ProductRecord) -> FusionResult<Unit> + Send + Sync + 'static,
    {
        let products = self.select(selector)?;
        info!(job, products = products.len(), "maintenance started");

        let context = Arc::clone(&self.context);
        let mut report = MaintenanceReport::default();
        for (product, result) in self.executor.map(products, move |product| unit(&context, product)) {
            match result {
                Ok(Unit::Done) => report.processed += 1,
                Ok(Unit::UpToDate) => report.skipped += 1,
                Err(e) => {
                    warn!(job, product = %product.identifier, error = %e, "maintenance failed");
                    report.failed += 1;
                }
            }
        }
        info!(job, %report, "maintenance finished");
        Ok(report)
    }

    /// Computes and caches the model values of the selected products.
    ///
    /// Products whose cached values are current for every model are
    /// skipped unless `force` is set.
    ///
    /// # Errors
    ///
    /// Fails only when the products cannot be listed.
    pub fn seed_cache(&self, selector: &RecordSelector, force: bool) -> FusionResult<MaintenanceReport> {
        self.run("seed", selector, move |context, product| context.seed(product, force))
    }

    /// Removes the cached values of the selected products.
    ///
    /// # Errors
    ///
    /// Fails only when the products cannot be listed.
    pub fn flush_cache(&self, selector: &RecordSelector) -> FusionResult<MaintenanceReport> {
        self.run("flush", selector, Context::flush)
    }

    /// Counts the selected products by cache state, per model.
    ///
    /// # Errors
    ///
    /// Fails only when the products cannot be listed.
    pub fn cache_statistics(&self, selector: &RecordSelector) -> FusionResult<CacheStatistics> {
        let products = self.select(selector)?;
        let context = Arc::clone(&self.context);
        let results = self.executor.map(products, move |product| {
            context
                .models
                .iter()
                .map(|model| Ok((model.name().to_string(), context.state(product, model)?)))
                .collect::<FusionResult<Vec<_>>>()
        });

        let mut statistics = CacheStatistics::default();
        for model in &self.context.models {
            statistics.models.entry(model.name().to_string()).or_default();
        }
        for (product, result) in results {
            match result {
                Ok(states) => {
                    for (model, state) in states {
                        statistics.models.entry(model).or_default().add(state);
                    }
                }
                Err(e) => {
                    warn!(product = %product.identifier, error = %e, "cache state unavailable");
                    statistics.failed += 1;
                }
            }
        }
        Ok(statistics)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn record(identifier: &str) -> ProductRecord {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ProductRecord::new(identifier, "MAG", start, start + chrono::Duration::days(1))
    }

    #[test]
    fn test_selector_matches_identifiers() {
        let selector = RecordSelector::new("^SW_OPER_MAGA_.*_0602$").unwrap();
        assert!(selector.is_match(&record("SW_OPER_MAGA_LR_1B_20240101_0602")));
        assert!(!selector.is_match(&record("SW_OPER_MAGB_LR_1B_20240101_0602")));
        assert!(!selector.is_match(&record("SW_OPER_MAGA_LR_1B_20240101_0601")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            RecordSelector::new("[unclosed"),
            Err(ValidationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_report_display() {
        let report = MaintenanceReport {
            processed: 3,
            skipped: 2,
            failed: 1,
        };
        assert_eq!(report.total(), 6);
        assert_eq!(report.to_string(), "3 processed, 2 skipped, 1 failed");
    }

    #[test]
    fn test_counts_by_state() {
        let mut counts = CacheCounts::default();
        for state in [CacheState::Seeded, CacheState::Obsolete, CacheState::Seeded, CacheState::Missing] {
            counts.add(state);
        }
        assert_eq!(
            counts,
            CacheCounts {
                seeded: 2,
                obsolete: 1,
                missing: 1
            }
        );
    }
}
