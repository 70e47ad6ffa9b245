//! Source provenance of derived values.
//!
//! A model reports, for a time span, the external inputs it would use to
//! evaluate that span (coefficient files, index tables, ...). Cached model
//! values store the provenance they were computed from; a cached entry is
//! trusted only while the live model still reports the same provenance.

use std::collections::BTreeSet;
use std::fmt;

use blake3::Hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{datetime_to_micros, TimeRange};

/// One input source and the time span it was used for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    /// Source identifier, e.g. a file or product name.
    pub name: String,
    /// Start of validity (inclusive).
    pub start: DateTime<Utc>,
    /// End of validity (exclusive).
    pub end: DateTime<Utc>,
}

impl SourceSpan {
    pub fn new(name: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {})", self.name, self.start, self.end)
    }
}

/// Ordered, de-duplicated set of source spans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    sources: BTreeSet<SourceSpan>,
}

impl Provenance {
    #[must_use]
    pub fn new(sources: impl IntoIterator<Item = SourceSpan>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceSpan> {
        self.sources.iter()
    }

    /// Source names without their spans.
    #[must_use]
    pub fn names(&self) -> BTreeSet<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    /// Spans whose validity touches `range`, end points included.
    #[must_use]
    pub fn restricted(&self, range: &TimeRange) -> Self {
        self.sources
            .iter()
            .filter(|source| source.start <= range.end && source.end >= range.start)
            .cloned()
            .collect()
    }

    /// True when both provenances name the same sources, spans ignored.
    #[must_use]
    pub fn same_sources(&self, other: &Self) -> bool {
        self.names() == other.names()
    }

    /// Adds all spans of `other`.
    pub fn extend(&mut self, other: &Self) {
        self.sources.extend(other.sources.iter().cloned());
    }

    /// Stable content digest, hex encoded.
    ///
    /// Two provenances have the same fingerprint exactly when they contain
    /// the same spans.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut h = Hasher::new();
        for source in &self.sources {
            h.update(&(source.name.len() as u64).to_le_bytes());
            h.update(source.name.as_bytes());
            h.update(&datetime_to_micros(source.start).to_le_bytes());
            h.update(&datetime_to_micros(source.end).to_le_bytes());
        }
        h.finalize().to_hex().to_string()
    }
}

impl FromIterator<SourceSpan> for Provenance {
    fn from_iter<T: IntoIterator<Item = SourceSpan>>(iter: T) -> Self {
        Self::new(iter)
    }
}
