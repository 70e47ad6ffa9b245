//! Gap-aware 1D interpolation of dataset columns.
//!
//! Source samples are split into contiguous segments wherever two
//! consecutive timestamps are further apart than the gap threshold. A
//! target timestamp receives a value only if it falls inside a segment
//! widened by the segment neighbourhood; everything else gets the column's
//! missing-value sentinel.
//!
//! All times are epoch microseconds and both time arrays must be sorted in
//! ascending order.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::column::{Column, ElementType, Values};
use crate::error::{DatasetError, ValidationError};

const MICROS_PER_SECOND: f64 = 1e6;

/// Interpolation method of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationKind {
    /// Nearest sample; ties go to the earlier sample.
    #[default]
    Nearest,
    /// Zero-order hold of the preceding sample.
    #[serde(alias = "zero")]
    Previous,
    /// Piecewise linear.
    Linear,
    /// Cubic Hermite spline using a `_d_{name}_dt` slope column.
    Cubic,
}

impl InterpolationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Previous => "previous",
            Self::Linear => "linear",
            Self::Cubic => "cubic",
        }
    }
}

impl fmt::Display for InterpolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterpolationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(Self::Nearest),
            "previous" | "zero" => Ok(Self::Previous),
            "linear" => Ok(Self::Linear),
            "cubic" => Ok(Self::Cubic),
            other => Err(ValidationError::InvalidInterpolationKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// Name of the slope column used by cubic interpolation of `name`.
#[must_use]
pub fn slope_variable(name: &str) -> String {
    format!("_d_{name}_dt")
}

/// Gap handling and per-variable kinds applied by
/// [`Dataset::interpolate`](crate::Dataset::interpolate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpolationSettings {
    /// Largest sample spacing (µs) still considered contiguous.
    pub gap_threshold: i64,
    /// Segment widening (µs) on each side.
    pub segment_neighbourhood: i64,
    /// Kind used for variables without an explicit entry.
    pub default_kind: InterpolationKind,
    /// Per-variable kinds.
    pub kinds: HashMap<String, InterpolationKind>,
}

impl Default for InterpolationSettings {
    fn default() -> Self {
        Self {
            gap_threshold: i64::MAX,
            segment_neighbourhood: 0,
            default_kind: InterpolationKind::Nearest,
            kinds: HashMap::new(),
        }
    }
}

impl InterpolationSettings {
    /// Kind configured for `variable`.
    #[must_use]
    pub fn kind_of(&self, variable: &str) -> InterpolationKind {
        self.kinds.get(variable).copied().unwrap_or(self.default_kind)
    }

    /// Returns a copy with every variable interpolated as `kind`.
    #[must_use]
    pub fn forced(&self, kind: InterpolationKind) -> Self {
        Self {
            default_kind: kind,
            kinds: HashMap::new(),
            ..self.clone()
        }
    }
}

/// Per-target source row, or `None` for a gap.
type NeighbourPlan = Vec<Option<usize>>;

/// Source rows feeding one spline target.
#[derive(Debug, Clone, Copy)]
enum SplineRow {
    /// Isolated sample held across its neighbourhood.
    Hold(usize),
    /// Blend of rows `k` and `k + 1` with parameter `t`.
    Blend(usize, f64),
}

type SplinePlan = Vec<Option<SplineRow>>;

/// Contiguous source segment and the target rows it covers.
#[derive(Debug, Clone, Copy)]
struct Segment {
    src_low: usize,
    src_high: usize,
    dst_low: usize,
    dst_high: usize,
}

/// Interpolator reusing one target sampling for many columns.
#[derive(Debug)]
pub struct Interp1D<'a> {
    source: &'a [i64],
    target: &'a [i64],
    gap_threshold: i64,
    segment_neighbourhood: i64,
    neighbour_plans: HashMap<InterpolationKind, NeighbourPlan>,
    spline_plan: Option<SplinePlan>,
}

impl<'a> Interp1D<'a> {
    /// Creates an interpolator from `source` sample times onto `target`.
    ///
    /// Negative thresholds are treated as zero and the neighbourhood is
    /// clamped to `[0, gap_threshold]`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnsortedTimes` if either array is not
    /// sorted in ascending order.
    pub fn new(
        source: &'a [i64],
        target: &'a [i64],
        gap_threshold: i64,
        segment_neighbourhood: i64,
    ) -> Result<Self, ValidationError> {
        ensure_sorted(source, "interpolated source times")?;
        ensure_sorted(target, "interpolation target times")?;
        let gap_threshold = gap_threshold.max(0);
        Ok(Self {
            source,
            target,
            gap_threshold,
            segment_neighbourhood: segment_neighbourhood.clamp(0, gap_threshold),
            neighbour_plans: HashMap::new(),
            spline_plan: None,
        })
    }

    /// Interpolates one column.
    ///
    /// Cubic interpolation without a slope column and linear or cubic
    /// interpolation of non-numeric columns fall back to the closest
    /// applicable kind.
    ///
    /// # Errors
    ///
    /// Fails when the column or slope length differs from the source time
    /// array, or the slope shape differs from the column.
    pub fn interpolate(
        &mut self,
        variable: &str,
        values: &Column,
        slope: Option<&Column>,
        kind: InterpolationKind,
    ) -> Result<Column, DatasetError> {
        if values.rows() != self.source.len() {
            return Err(DatasetError::LengthMismatch {
                variable: variable.to_string(),
                expected: self.source.len(),
                actual: values.rows(),
            });
        }

        let kind = match kind {
            InterpolationKind::Linear | InterpolationKind::Cubic
                if !values.element_type().is_numeric() =>
            {
                InterpolationKind::Nearest
            }
            InterpolationKind::Cubic if slope.is_none() => InterpolationKind::Linear,
            other => other,
        };

        match kind {
            InterpolationKind::Nearest | InterpolationKind::Previous => {
                self.interpolate_neighbour(variable, values, kind)
            }
            InterpolationKind::Linear => self.interpolate_spline(variable, values, None),
            InterpolationKind::Cubic => self.interpolate_spline(variable, values, slope),
        }
    }

    fn interpolate_neighbour(
        &mut self,
        variable: &str,
        values: &Column,
        kind: InterpolationKind,
    ) -> Result<Column, DatasetError> {
        let (lower, upper) = match kind {
            InterpolationKind::Previous => (0, self.segment_neighbourhood),
            _ => (self.segment_neighbourhood, self.segment_neighbourhood),
        };
        if !self.neighbour_plans.contains_key(&kind) {
            let plan = self.neighbour_plan(kind, lower, upper);
            self.neighbour_plans.insert(kind, plan);
        }
        let plan = &self.neighbour_plans[&kind];

        // One missing row is appended past the source rows and gaps point
        // at it.
        let gap_row = values.rows();
        let mut extended = values.clone();
        extended.append(variable, &Column::missing_like(values, 1))?;
        let rows: Vec<usize> = plan.iter().map(|row| row.unwrap_or(gap_row)).collect();
        extended.take(&rows)
    }

    fn interpolate_spline(
        &mut self,
        variable: &str,
        values: &Column,
        slope: Option<&Column>,
    ) -> Result<Column, DatasetError> {
        let width = values.width();
        let y = numeric(variable, values)?;
        let dy = match slope {
            Some(slope) => {
                if slope.rows() != values.rows() || slope.width() != width {
                    return Err(DatasetError::WidthMismatch {
                        variable: slope_variable(variable),
                        expected: width,
                        actual: slope.width(),
                    });
                }
                Some(numeric(&slope_variable(variable), slope)?)
            }
            None => None,
        };

        if self.spline_plan.is_none() {
            self.spline_plan = Some(self.spline_plan());
        }
        let source = self.source;
        let plan = self.spline_plan.as_deref().unwrap_or_default();

        let mut out = Vec::with_capacity(plan.len() * width);
        for entry in plan {
            let (k, t) = match *entry {
                None => {
                    out.extend(std::iter::repeat(f64::NAN).take(width));
                    continue;
                }
                Some(SplineRow::Hold(k)) => {
                    out.extend_from_slice(&y[k * width..(k + 1) * width]);
                    continue;
                }
                Some(SplineRow::Blend(k, t)) => (k, t),
            };
            let (a, b) = (1.0 - t, t);
            let row0 = &y[k * width..(k + 1) * width];
            let row1 = &y[(k + 1) * width..(k + 2) * width];
            match &dy {
                None => out.extend(row0.iter().zip(row1).map(|(y0, y1)| a * y0 + b * y1)),
                Some(dy) => {
                    // Hermite basis; slopes are per second.
                    #[allow(clippy::cast_precision_loss)]
                    let dx = (source[k + 1] - source[k]) as f64 / MICROS_PER_SECOND;
                    let (a2, b2) = (a * a, b * b);
                    let (h00, h01) = ((1.0 + 2.0 * b) * a2, (1.0 + 2.0 * a) * b2);
                    let (h10, h11) = (b * a2 * dx, -a * b2 * dx);
                    let d0 = &dy[k * width..(k + 1) * width];
                    let d1 = &dy[(k + 1) * width..(k + 2) * width];
                    for c in 0..width {
                        out.push(h00 * row0[c] + h01 * row1[c] + h10 * d0[c] + h11 * d1[c]);
                    }
                }
            }
        }

        Column::vector(Values::Float64(out), width).map(|c| c.with_attrs(values.attrs().clone()))
    }

    fn neighbour_plan(&self, kind: InterpolationKind, lower: i64, upper: i64) -> NeighbourPlan {
        let mut plan = vec![None; self.target.len()];
        for segment in self.segments(lower, upper) {
            let samples = &self.source[segment.src_low..segment.src_high];
            for dst in segment.dst_low..segment.dst_high {
                let x = self.target[dst];
                let offset = match kind {
                    InterpolationKind::Previous => {
                        samples.partition_point(|s| *s <= x).saturating_sub(1)
                    }
                    _ => nearest_offset(samples, x),
                };
                plan[dst] = Some(segment.src_low + offset);
            }
        }
        plan
    }

    fn spline_plan(&self) -> SplinePlan {
        let nb = self.segment_neighbourhood;
        let mut plan = vec![None; self.target.len()];
        for segment in self.segments(nb, nb) {
            let samples = &self.source[segment.src_low..segment.src_high];
            for dst in segment.dst_low..segment.dst_high {
                let x = self.target[dst];
                plan[dst] = Some(if samples.len() < 2 {
                    SplineRow::Hold(segment.src_low)
                } else {
                    let k = samples
                        .partition_point(|s| *s <= x)
                        .saturating_sub(1)
                        .min(samples.len() - 2);
                    let dx = samples[k + 1] - samples[k];
                    #[allow(clippy::cast_precision_loss)]
                    let t = if dx == 0 {
                        0.0
                    } else {
                        (x - samples[k]) as f64 / dx as f64
                    };
                    SplineRow::Blend(segment.src_low + k, t)
                });
            }
        }
        plan
    }

    /// Contiguous source ranges widened by the neighbourhood and the target
    /// rows falling into each. Later segments win target rows claimed by
    /// two overlapping neighbourhoods.
    fn segments(&self, lower: i64, upper: i64) -> Vec<Segment> {
        let source = self.source;
        let mut segments = Vec::new();
        let mut src_low = 0;
        for src_high in 1..=source.len() {
            let split = src_high == source.len()
                || source[src_high].saturating_sub(source[src_high - 1]) > self.gap_threshold;
            if !split {
                continue;
            }
            let x_low = source[src_low].saturating_sub(lower);
            let x_high = source[src_high - 1].saturating_add(upper);
            let dst_low = self.target.partition_point(|x| *x < x_low);
            let dst_high = self.target.partition_point(|x| *x <= x_high);
            if dst_high > dst_low {
                segments.push(Segment {
                    src_low,
                    src_high,
                    dst_low,
                    dst_high,
                });
            }
            src_low = src_high;
        }
        segments
    }
}

/// Offset of the sample closest to `x`; ties go to the earlier sample.
fn nearest_offset(samples: &[i64], x: i64) -> usize {
    let next = samples.partition_point(|s| *s < x);
    if next == 0 {
        return 0;
    }
    if next == samples.len() {
        return samples.len() - 1;
    }
    let before = x.saturating_sub(samples[next - 1]);
    let after = samples[next].saturating_sub(x);
    if before <= after {
        next - 1
    } else {
        next
    }
}

fn numeric(variable: &str, column: &Column) -> Result<Vec<f64>, DatasetError> {
    column
        .values()
        .to_f64()
        .ok_or_else(|| DatasetError::TypeMismatch {
            variable: variable.to_string(),
            expected: ElementType::Float64,
            actual: column.element_type(),
        })
}

fn ensure_sorted(times: &[i64], context: &str) -> Result<(), ValidationError> {
    if times.windows(2).all(|w| w[0] <= w[1]) {
        Ok(())
    } else {
        Err(ValidationError::UnsortedTimes {
            context: context.to_string(),
        })
    }
}
