//! Temporal types and timestamp conversions.
//!
//! Record coverage and query windows are half-open intervals `[start, end)`
//! of UTC instants. Timestamp columns inside a [`Dataset`](crate::Dataset)
//! store signed microseconds since the Unix epoch so interpolation can work
//! on plain numbers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A range of time (half-open interval: `[start, end)`).
///
/// # Examples
///
/// ```
/// use timefuse::TimeRange;
/// use chrono::{Duration, TimeZone, Utc};
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
/// let range = TimeRange::new(start, start + Duration::minutes(10)).unwrap();
///
/// assert!(range.contains(start));
/// assert!(!range.contains(start + Duration::minutes(10)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the range (inclusive).
    pub start: DateTime<Utc>,

    /// End of the range (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a time range from two timestamps.
    ///
    /// Zero-length ranges are allowed; they contain no instant.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeRange` if `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates a range of the given length starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeRange` if `duration` is negative.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Result<Self, ValidationError> {
        Self::new(start, start + duration)
    }

    /// Returns true when the range contains no instant.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check if a timestamp falls within this range `[start, end)`.
    #[must_use]
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time < self.end
    }

    /// Returns true if both ranges share at least one instant.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns the intersection of two ranges, if any.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// Returns a copy widened by `margin` on both sides.
    #[must_use]
    pub fn widened(&self, margin: Duration) -> Self {
        Self {
            start: self.start - margin,
            end: self.end + margin,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns the range bounds as epoch microseconds.
    #[must_use]
    pub fn to_micros(&self) -> (i64, i64) {
        (datetime_to_micros(self.start), datetime_to_micros(self.end))
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}",
            self.start.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
            self.end.format("%Y-%m-%dT%H:%M:%S%.6fZ")
        )
    }
}

/// Converts an instant to microseconds since the Unix epoch.
#[must_use]
pub fn datetime_to_micros(time: DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

/// Converts microseconds since the Unix epoch to an instant.
///
/// Values beyond the representable range saturate to the chrono limits.
#[must_use]
pub fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or(if micros < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Converts a duration to microseconds, saturating on overflow.
#[must_use]
pub fn duration_to_micros(duration: Duration) -> i64 {
    duration.num_microseconds().unwrap_or(if duration < Duration::zero() {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Serde helper (de)serializing a `Duration` as float seconds.
pub mod float_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_precision_loss)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let micros = super::duration_to_micros(*value);
        serializer.serialize_f64(micros as f64 * 1e-6)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        if !seconds.is_finite() {
            return Err(serde::de::Error::custom("duration must be finite"));
        }
        Ok(Duration::microseconds((seconds * 1e6).round() as i64))
    }
}
