//! Error types for timefuse.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the specific failure (shape mismatch, unreadable record, rejected
//! configuration) instead of parsing messages.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::column::ElementType;
use crate::storage::StorageError;

/// Validation errors raised while checking caller-supplied input.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid time range: start ({start}) must not be after end ({end})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
    },

    #[error("Invalid interpolation kind '{kind}'")]
    InvalidInterpolationKind {
        kind: String,
    },

    #[error("Timestamps must be sorted in ascending order ({context})")]
    UnsortedTimes {
        context: String,
    },
}

/// Errors raised by the column container and its primitives.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Array size mismatch for '{variable}': {actual} rows, dataset has {expected}")]
    LengthMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },

    #[error("Dataset variables mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    VariablesMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Element type mismatch for '{variable}': expected {expected}, found {actual}")]
    TypeMismatch {
        variable: String,
        expected: ElementType,
        actual: ElementType,
    },

    #[error("Shape mismatch for '{variable}': expected {expected} components, found {actual}")]
    WidthMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },

    #[error("Variable '{variable}' not found in dataset")]
    MissingVariable {
        variable: String,
    },

    #[error("Row index {index} out of bounds for {len} rows")]
    IndexOutOfBounds {
        index: usize,
        len: usize,
    },

    #[error("Selection mask has {actual} entries, dataset has {expected} rows")]
    MaskLength {
        expected: usize,
        actual: usize,
    },

    #[error("Variable '{variable}' is not a vector")]
    NotAVector {
        variable: String,
    },

    #[error("{len} values cannot be split into rows of {width} components")]
    RaggedColumn {
        len: usize,
        width: usize,
    },
}

/// Errors raised while building the producer/consumer graph.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Master time-series is already set")]
    MasterAlreadySet,

    #[error("No master time-series is set")]
    NoMaster,
}

/// Errors raised while evaluating a resolved pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to apply filters due to missing source variables: {filters}")]
    FiltersNotApplied {
        filters: String,
    },

    #[error("Requested data exceeds the maximum limit of {limit} samples")]
    SampleLimitExceeded {
        limit: usize,
    },
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
}

/// Top-level error type for timefuse.
#[derive(Debug, Error)]
pub enum FusionError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Column types cannot be inferred without at least one record.
    #[error("Empty collection {collection}: variables and their types cannot be determined")]
    EmptyCollection {
        collection: String,
    },

    #[error("{series} does not support {operation}")]
    Unsupported {
        series: String,
        operation: &'static str,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl FusionError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a dataset (shape/type) error.
    #[must_use]
    pub const fn is_dataset(&self) -> bool {
        matches!(self, Self::Dataset(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a pipeline error.
    #[must_use]
    pub const fn is_pipeline(&self) -> bool {
        matches!(self, Self::Pipeline(_))
    }

    /// Returns true if retrying the failed call could succeed.
    ///
    /// Data-integrity failures never change on retry; only backend
    /// failures of the storage layer are considered transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => matches!(e, StorageError::BackendError(_)),
            _ => false,
        }
    }
}

/// Result type alias for timefuse operations.
pub type FusionResult<T> = Result<T, FusionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_error_length_mismatch() {
        let err = DatasetError::LengthMismatch {
            variable: "F".to_string(),
            expected: 10,
            actual: 3,
        };
        let msg = format!("{err}");
        assert!(msg.contains("'F'"));
        assert!(msg.contains("10"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_type_mismatch_names_types() {
        let err = DatasetError::TypeMismatch {
            variable: "Timestamp".to_string(),
            expected: ElementType::Timestamp,
            actual: ElementType::Float64,
        };
        let msg = format!("{err}");
        assert!(msg.contains("timestamp"));
        assert!(msg.contains("float64"));
    }

    #[test]
    fn test_fusion_error_from_dataset() {
        let err: FusionError = DatasetError::MissingVariable {
            variable: "B_NEC".to_string(),
        }
        .into();
        assert!(err.is_dataset());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_backend_failure_is_retryable() {
        let err: FusionError = StorageError::BackendError("timeout".to_string()).into();
        assert!(err.is_storage());
        assert!(err.is_retryable());

        let err: FusionError = StorageError::ReadFailed {
            record: "r1".to_string(),
            message: "corrupt".to_string(),
        }
        .into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_collection_message() {
        let err = FusionError::EmptyCollection {
            collection: "SW_OPER_MAGA_LR_1B".to_string(),
        };
        assert!(format!("{err}").contains("SW_OPER_MAGA_LR_1B"));
    }

    #[test]
    fn test_internal() {
        let err = FusionError::internal("unexpected state");
        assert!(format!("{err}").contains("unexpected state"));
        assert!(!err.is_validation());
    }
}
