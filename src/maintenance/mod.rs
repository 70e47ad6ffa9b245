//! Out-of-band maintenance of cached model values.
//!
//! Jobs fan independent per-product units out over a [`StreamExecutor`]
//! and aggregate the outcomes in one place.

mod jobs;
mod pool;

pub use jobs::{CacheCounts, CacheMaintenance, CacheState, CacheStatistics, MaintenanceReport, RecordSelector};
pub use pool::StreamExecutor;
