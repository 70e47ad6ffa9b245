//! Configuration for timefuse.
//!
//! Product parameters steer how a product type is read and resampled;
//! the remaining sections bound responses and size the maintenance worker
//! pool. Everything is `serde`-loadable from JSON, durations being given
//! as float seconds.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ValidationError};
use crate::interpolate::{InterpolationKind, InterpolationSettings};
use crate::time::{duration_to_micros, float_seconds};

/// Default name of the timestamp variable.
pub const DEFAULT_TIME_VARIABLE: &str = "Timestamp";

/// Reading and resampling parameters of one product type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductParameters {
    /// Name of the timestamp variable.
    pub time_variable: String,
    /// Widening of record listings on both sides.
    #[serde(with = "float_seconds")]
    pub time_tolerance: Duration,
    /// Extra data read around an interpolated window.
    #[serde(with = "float_seconds")]
    pub time_overlap: Duration,
    /// Largest sample spacing still interpolated across.
    #[serde(with = "float_seconds")]
    pub gap_threshold: Duration,
    /// Validity of edge samples beyond their segment.
    #[serde(with = "float_seconds")]
    pub segment_neighbourhood: Duration,
    /// Kind of variables without an entry in `interpolation_kinds`.
    pub default_interpolation_kind: InterpolationKind,
    /// Per-variable interpolation kinds.
    pub interpolation_kinds: HashMap<String, InterpolationKind>,
}

impl Default for ProductParameters {
    fn default() -> Self {
        Self {
            time_variable: DEFAULT_TIME_VARIABLE.to_string(),
            time_tolerance: Duration::zero(),
            time_overlap: Duration::seconds(60),
            gap_threshold: Duration::seconds(30),
            segment_neighbourhood: Duration::milliseconds(500),
            default_interpolation_kind: InterpolationKind::Nearest,
            interpolation_kinds: HashMap::new(),
        }
    }
}

impl ProductParameters {
    /// Sets the kind of the listed variables.
    #[must_use]
    pub fn with_kinds(mut self, kind: InterpolationKind, variables: &[&str]) -> Self {
        for variable in variables {
            self.interpolation_kinds.insert((*variable).to_string(), kind);
        }
        self
    }

    /// Interpolation settings in dataset units.
    #[must_use]
    pub fn interpolation_settings(&self) -> InterpolationSettings {
        InterpolationSettings {
            gap_threshold: duration_to_micros(self.gap_threshold),
            segment_neighbourhood: duration_to_micros(self.segment_neighbourhood),
            default_kind: self.default_interpolation_kind,
            kinds: self.interpolation_kinds.clone(),
        }
    }

    /// Checks that no duration is negative.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let durations = [
            ("time_tolerance", self.time_tolerance),
            ("time_overlap", self.time_overlap),
            ("gap_threshold", self.gap_threshold),
            ("segment_neighbourhood", self.segment_neighbourhood),
        ];
        for (name, value) in durations {
            if value < Duration::zero() {
                return Err(ValidationError::InvalidParameter {
                    name: name.to_string(),
                    reason: format!("must not be negative, got {value}"),
                });
            }
        }
        if self.time_variable.is_empty() {
            return Err(ValidationError::InvalidParameter {
                name: "time_variable".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Product parameters by product type with a fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterRegistry {
    /// Parameters of product types without an override.
    pub defaults: ProductParameters,
    /// Overrides by product type.
    pub product_types: HashMap<String, ProductParameters>,
}

impl ParameterRegistry {
    /// Registry with the presets of the known auxiliary and magnetic
    /// product types.
    #[must_use]
    pub fn builtin() -> Self {
        use InterpolationKind::{Linear, Previous};

        let minutes = Duration::minutes;
        let mut product_types = HashMap::new();

        product_types.insert(
            "SW_MAGx_LR_1B".to_string(),
            ProductParameters::default().with_kinds(Linear, &["B_NEC", "F"]),
        );
        product_types.insert(
            "SW_AUX_IMF_2_".to_string(),
            ProductParameters {
                time_tolerance: minutes(61),
                time_overlap: Duration::hours(2),
                gap_threshold: minutes(61),
                segment_neighbourhood: minutes(60),
                default_interpolation_kind: Previous,
                ..ProductParameters::default()
            }
            .with_kinds(Previous, &["F10_INDEX", "IMF_BY_GSM", "IMF_BZ_GSM", "IMF_V"]),
        );
        product_types.insert(
            "OMNI_HR_1min".to_string(),
            ProductParameters {
                time_tolerance: Duration::zero(),
                time_overlap: minutes(120),
                gap_threshold: Duration::seconds(61),
                segment_neighbourhood: Duration::seconds(60),
                default_interpolation_kind: Previous,
                ..ProductParameters::default()
            }
            .with_kinds(
                Linear,
                &["IMF_BY_GSM", "IMF_BZ_GSM", "IMF_V", "IMF_Vx", "IMF_Vy", "IMF_Vz"],
            ),
        );
        product_types.insert(
            "GFZ_KP".to_string(),
            ProductParameters {
                time_tolerance: minutes(181),
                time_overlap: Duration::hours(6),
                gap_threshold: minutes(181),
                segment_neighbourhood: minutes(180),
                default_interpolation_kind: Previous,
                ..ProductParameters::default()
            }
            .with_kinds(Previous, &["Kp", "ap"]),
        );
        product_types.insert(
            "WDC_DST".to_string(),
            ProductParameters {
                time_tolerance: minutes(61),
                time_overlap: Duration::hours(2),
                gap_threshold: minutes(61),
                segment_neighbourhood: minutes(60),
                default_interpolation_kind: Previous,
                ..ProductParameters::default()
            }
            .with_kinds(Linear, &["Dst"])
            .with_kinds(Previous, &["dDst"]),
        );

        Self {
            defaults: ProductParameters::default(),
            product_types,
        }
    }

    /// Parses a registry from JSON. Missing sections take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on malformed JSON or invalid parameters.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let registry: Self = serde_json::from_str(json)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Parameters of a product type.
    #[must_use]
    pub fn get(&self, product_type: &str) -> &ProductParameters {
        self.product_types.get(product_type).unwrap_or(&self.defaults)
    }

    /// Adds or replaces the parameters of a product type.
    pub fn insert(&mut self, product_type: impl Into<String>, parameters: ProductParameters) {
        self.product_types.insert(product_type.into(), parameters);
    }

    /// Validates every parameter set.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.defaults.validate()?;
        self.product_types.values().try_for_each(ProductParameters::validate)
    }
}

/// Limits applied while evaluating a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Largest number of rows a single response may carry.
    pub max_samples: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_samples: 432_000,
        }
    }
}

/// Worker pool sizing of maintenance jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Bound of the job queue; `None` means twice the worker count.
    pub queue_capacity: Option<usize>,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, usize::from),
            queue_capacity: None,
        }
    }
}

impl MaintenanceConfig {
    /// Configuration with a fixed worker count.
    #[must_use]
    pub const fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            queue_capacity: None,
        }
    }

    /// Effective worker count (at least one).
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }

    /// Effective queue bound (at least one).
    #[must_use]
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or(2 * self.effective_workers())
            .max(1)
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Per-product-type time series parameters.
    pub products: ParameterRegistry,
    pub pipeline: PipelineConfig,
    pub maintenance: MaintenanceConfig,
}

impl FusionConfig {
    /// Parses the configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on malformed JSON or invalid parameters.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.products.validate()?;
        Ok(config)
    }

    /// Reads the configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        debug!(path = %path.display(), product_types = config.products.product_types.len(), "configuration loaded");
        Ok(config)
    }
}
