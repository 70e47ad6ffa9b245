//! Union of the timelines of several series.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::{known_variables, Chunks, TimeSeries};
use crate::column::Selection;
use crate::dataset::Dataset;
use crate::error::{FusionError, FusionResult, ValidationError};
use crate::time::TimeRange;

/// Series merging the times and shared variables of several series.
///
/// Chunks are cut at the earliest end among the pending source chunks, so
/// every yielded chunk is sorted, free of duplicate times and later than
/// the previous one. The merged series only drives a pipeline as master;
/// it cannot be interpolated.
pub struct MergedTimeSeries {
    identifier: String,
    sources: Vec<Arc<dyn TimeSeries>>,
    variables: Vec<String>,
    required: [String; 1],
}

impl std::fmt::Debug for MergedTimeSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergedTimeSeries")
            .field("identifier", &self.identifier)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

impl MergedTimeSeries {
    /// # Errors
    ///
    /// Returns `InvalidParameter` for no sources or sources with different
    /// time variables.
    pub fn new(sources: Vec<Arc<dyn TimeSeries>>) -> Result<Self, ValidationError> {
        let Some(head) = sources.first() else {
            return Err(ValidationError::InvalidParameter {
                name: "sources".to_string(),
                reason: "at least one time series is required".to_string(),
            });
        };
        let time_variable = head.time_variable().to_string();
        if let Some(other) = sources.iter().find(|s| s.time_variable() != time_variable) {
            return Err(ValidationError::InvalidParameter {
                name: "sources".to_string(),
                reason: format!(
                    "time variable mismatch: {time_variable} != {}",
                    other.time_variable()
                ),
            });
        }

        let mut variables = vec![time_variable.clone()];
        variables.extend(
            head.variables()
                .iter()
                .filter(|v| **v != time_variable)
                .filter(|v| sources.iter().all(|s| s.variables().contains(v)))
                .cloned(),
        );
        let identifier = format!(
            "merged({})",
            sources
                .iter()
                .map(|s| s.identifier())
                .collect::<Vec<_>>()
                .join(",")
        );
        Ok(Self {
            identifier,
            sources,
            variables,
            required: [time_variable],
        })
    }
}

impl TimeSeries for MergedTimeSeries {
    fn identifier(&self) -> &str {
        &self.identifier
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
        let mut working = vec![self.required[0].clone()];
        working.extend(variables.iter().filter(|v| **v != self.required[0]).cloned());

        let heads = self
            .sources
            .iter()
            .map(|source| source.subset(window, Some(&working)).map(Head::new))
            .collect::<FusionResult<Vec<_>>>()?;
        debug!(series = %self.identifier, window = %window, sources = heads.len(), "merged subset");
        Ok(Box::new(MergeIter {
            heads,
            time_variable: &self.required[0],
            variables,
            empty: None,
            yielded: 0,
            finished: false,
        }))
    }

    fn interpolate(&self, _times: &[i64], _variables: Option<&[String]>) -> FusionResult<Dataset> {
        Err(FusionError::Unsupported {
            series: self.identifier.clone(),
            operation: "interpolation",
        })
    }

    fn products(&self) -> BTreeSet<String> {
        self.sources.iter().flat_map(|s| s.products()).collect()
    }
}

/// Pending non-empty chunk of one source.
struct Head<'a> {
    chunks: Chunks<'a>,
    pending: Option<Dataset>,
    exhausted: bool,
}

impl<'a> Head<'a> {
    fn new(chunks: Chunks<'a>) -> Self {
        Self {
            chunks,
            pending: None,
            exhausted: false,
        }
    }

    /// Pulls chunks until a non-empty one is pending, remembering the
    /// first empty chunk seen.
    fn fill(&mut self, empty: &mut Option<Dataset>) -> FusionResult<()> {
        while self.pending.is_none() && !self.exhausted {
            match self.chunks.next() {
                None => self.exhausted = true,
                Some(chunk) => {
                    let chunk = chunk?;
                    if !chunk.is_empty() {
                        self.pending = Some(chunk);
                    } else if empty.is_none() {
                        *empty = Some(chunk);
                    }
                }
            }
        }
        Ok(())
    }

    /// Takes the pending rows with times not after `cut_at`.
    fn split(&mut self, time_variable: &str, cut_at: i64) -> FusionResult<Option<Dataset>> {
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };
        let mask: Vec<bool> = pending
            .times(time_variable)?
            .iter()
            .map(|&t| t <= cut_at)
            .collect();
        if mask.iter().all(|&m| m) {
            return Ok(Some(pending));
        }
        if !mask.iter().any(|&m| m) {
            self.pending = Some(pending);
            return Ok(None);
        }
        let rest: Vec<bool> = mask.iter().map(|m| !m).collect();
        let head = pending.subset(&Selection::Mask(mask))?;
        self.pending = Some(pending.into_subset(&Selection::Mask(rest))?);
        Ok(Some(head))
    }
}

struct MergeIter<'a> {
    heads: Vec<Head<'a>>,
    time_variable: &'a str,
    variables: Vec<String>,
    empty: Option<Dataset>,
    yielded: usize,
    finished: bool,
}

impl MergeIter<'_> {
    fn next_chunk(&mut self) -> FusionResult<Option<Dataset>> {
        let mut cut_at: Option<i64> = None;
        for head in &mut self.heads {
            head.fill(&mut self.empty)?;
            if let Some(pending) = &head.pending {
                let end = pending.times(self.time_variable)?.iter().copied().max();
                cut_at = match (cut_at, end) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            }
        }
        let Some(cut_at) = cut_at else {
            return Ok(None);
        };

        let mut merged = Dataset::new();
        for head in &mut self.heads {
            if let Some(part) = head.split(self.time_variable, cut_at)? {
                merged.append_compatible(&part)?;
            }
        }
        let times = merged.times(self.time_variable)?;
        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by_key(|&row| times[row]);
        order.dedup_by_key(|row| times[*row]);
        Ok(Some(merged.into_subset(&Selection::Indices(order))?))
    }
}

impl Iterator for MergeIter<'_> {
    type Item = FusionResult<Dataset>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = match self.next_chunk() {
            Ok(Some(chunk)) => Ok(chunk),
            Ok(None) => {
                self.finished = true;
                if self.yielded > 0 {
                    return None;
                }
                Ok(self.empty.take()?)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        };
        self.yielded += 1;
        Some(result.map(|chunk| chunk.extract(&self.variables)))
    }
}
