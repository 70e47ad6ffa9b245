//! Typed column storage used by [`Dataset`](crate::Dataset).
//!
//! A column is a flat buffer of values of one element type split into rows
//! of `width` components. Scalars have width 1, vectors such as `B_NEC`
//! have width 3. Row operations always move whole rows.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// Element type tag of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// IEEE 754 double precision floats.
    Float64,
    /// Signed 64-bit integers.
    Int64,
    /// Microseconds since the Unix epoch.
    Timestamp,
    /// Booleans.
    Bool,
    /// UTF-8 strings.
    Text,
}

impl ElementType {
    /// Returns true for types interpolation can combine arithmetically.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Float64 | Self::Int64 | Self::Timestamp)
    }

    /// Returns the missing-value sentinel of the type ignoring attributes.
    #[must_use]
    pub fn default_missing(self) -> Scalar {
        match self {
            Self::Float64 => Scalar::Float64(f64::NAN),
            Self::Int64 => Scalar::Int64(i64::MIN),
            Self::Timestamp => Scalar::Timestamp(i64::MIN),
            Self::Bool => Scalar::Bool(false),
            Self::Text => Scalar::Text(String::new()),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Float64 => "float64",
            Self::Int64 => "int64",
            Self::Timestamp => "timestamp",
            Self::Bool => "bool",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Scalar {
    Float64(f64),
    Int64(i64),
    Timestamp(i64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    pub const fn element_type(&self) -> ElementType {
        match self {
            Self::Float64(_) => ElementType::Float64,
            Self::Int64(_) => ElementType::Int64,
            Self::Timestamp(_) => ElementType::Timestamp,
            Self::Bool(_) => ElementType::Bool,
            Self::Text(_) => ElementType::Text,
        }
    }

    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Descriptive column metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnAttrs {
    /// Physical unit, e.g. `nT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Value marking missing data for types without NaN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<Scalar>,
}

impl ColumnAttrs {
    #[must_use]
    pub fn with_unit(unit: impl Into<String>) -> Self {
        Self {
            unit: Some(unit.into()),
            ..Self::default()
        }
    }
}

/// Flat typed value buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Values {
    Float64(Vec<f64>),
    Int64(Vec<i64>),
    Timestamp(Vec<i64>),
    Bool(Vec<bool>),
    Text(Vec<String>),
}

/// Applies the same expression to whichever buffer variant is present,
/// rebuilding the same variant from the result.
macro_rules! map_values {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            Values::Float64($v) => Values::Float64($body),
            Values::Int64($v) => Values::Int64($body),
            Values::Timestamp($v) => Values::Timestamp($body),
            Values::Bool($v) => Values::Bool($body),
            Values::Text($v) => Values::Text($body),
        }
    };
}

impl Values {
    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        match self {
            Self::Float64(_) => ElementType::Float64,
            Self::Int64(_) => ElementType::Int64,
            Self::Timestamp(_) => ElementType::Timestamp,
            Self::Bool(_) => ElementType::Bool,
            Self::Text(_) => ElementType::Text,
        }
    }

    /// Number of scalar values in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float64(v) => v.len(),
            Self::Int64(v) | Self::Timestamp(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a buffer of `len` copies of `value`.
    #[must_use]
    pub fn repeat(value: &Scalar, len: usize) -> Self {
        match value {
            Scalar::Float64(v) => Self::Float64(vec![*v; len]),
            Scalar::Int64(v) => Self::Int64(vec![*v; len]),
            Scalar::Timestamp(v) => Self::Timestamp(vec![*v; len]),
            Scalar::Bool(v) => Self::Bool(vec![*v; len]),
            Scalar::Text(v) => Self::Text(vec![v.clone(); len]),
        }
    }

    /// Creates an empty buffer of the given type.
    #[must_use]
    pub const fn empty(element_type: ElementType) -> Self {
        match element_type {
            ElementType::Float64 => Self::Float64(Vec::new()),
            ElementType::Int64 => Self::Int64(Vec::new()),
            ElementType::Timestamp => Self::Timestamp(Vec::new()),
            ElementType::Bool => Self::Bool(Vec::new()),
            ElementType::Text => Self::Text(Vec::new()),
        }
    }

    /// Returns the value at flat position `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Scalar> {
        match self {
            Self::Float64(v) => v.get(index).copied().map(Scalar::Float64),
            Self::Int64(v) => v.get(index).copied().map(Scalar::Int64),
            Self::Timestamp(v) => v.get(index).copied().map(Scalar::Timestamp),
            Self::Bool(v) => v.get(index).copied().map(Scalar::Bool),
            Self::Text(v) => v.get(index).cloned().map(Scalar::Text),
        }
    }

    /// Converts numeric buffers to floats.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match self {
            Self::Float64(v) => Some(v.clone()),
            Self::Int64(v) | Self::Timestamp(v) => Some(v.iter().map(|x| *x as f64).collect()),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }
}

/// A typed column of `rows × width` values with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    values: Values,
    width: usize,
    #[serde(default)]
    attrs: ColumnAttrs,
}

impl Column {
    /// Creates a scalar (width 1) column.
    #[must_use]
    pub fn new(values: Values) -> Self {
        Self {
            values,
            width: 1,
            attrs: ColumnAttrs::default(),
        }
    }

    /// Creates a column of rows with `width` components each.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::RaggedColumn` if the buffer length is not a
    /// multiple of `width` or `width` is zero.
    pub fn vector(values: Values, width: usize) -> Result<Self, DatasetError> {
        let len = values.len();
        if width == 0 || len % width != 0 {
            return Err(DatasetError::RaggedColumn { len, width });
        }
        Ok(Self {
            values,
            width,
            attrs: ColumnAttrs::default(),
        })
    }

    /// Creates an empty column of the given type and width.
    #[must_use]
    pub fn empty(element_type: ElementType, width: usize) -> Self {
        Self {
            values: Values::empty(element_type),
            width: width.max(1),
            attrs: ColumnAttrs::default(),
        }
    }

    /// Creates a column of `rows` rows all set to `value`.
    #[must_use]
    pub fn filled(value: &Scalar, rows: usize, width: usize) -> Self {
        let width = width.max(1);
        Self {
            values: Values::repeat(value, rows * width),
            width,
            attrs: ColumnAttrs::default(),
        }
    }

    /// Creates a column of `rows` missing-value rows shaped like `template`.
    #[must_use]
    pub fn missing_like(template: &Self, rows: usize) -> Self {
        Self::filled(&template.missing_value(), rows, template.width).with_attrs(template.attrs.clone())
    }

    pub fn from_f64(values: Vec<f64>) -> Self {
        Self::new(Values::Float64(values))
    }

    pub fn from_timestamps(values: Vec<i64>) -> Self {
        Self::new(Values::Timestamp(values))
    }

    #[must_use]
    pub fn with_attrs(mut self, attrs: ColumnAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    #[must_use]
    pub const fn values(&self) -> &Values {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Values {
        self.values
    }

    #[must_use]
    pub const fn attrs(&self) -> &ColumnAttrs {
        &self.attrs
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        self.values.element_type()
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.values.len() / self.width
    }

    /// Missing-value sentinel: NaN for floats, otherwise the `fill_value`
    /// attribute when it matches the type, otherwise the type default.
    #[must_use]
    pub fn missing_value(&self) -> Scalar {
        let element_type = self.element_type();
        if element_type == ElementType::Float64 {
            return Scalar::Float64(f64::NAN);
        }
        match &self.attrs.fill_value {
            Some(fill) if fill.element_type() == element_type => fill.clone(),
            _ => element_type.default_missing(),
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.values {
            Values::Float64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamps(&self) -> Option<&[i64]> {
        match &self.values {
            Values::Timestamp(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match &self.values {
            Values::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a column made of the given rows, in the given order.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::IndexOutOfBounds` for an index past the end.
    pub fn take(&self, rows: &[usize]) -> Result<Self, DatasetError> {
        let len = self.rows();
        if let Some(&index) = rows.iter().find(|&&index| index >= len) {
            return Err(DatasetError::IndexOutOfBounds { index, len });
        }
        let width = self.width;
        Ok(Self {
            values: map_values!(&self.values, v => gather(v, width, rows)),
            width,
            attrs: self.attrs.clone(),
        })
    }

    /// Returns a contiguous row range.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::IndexOutOfBounds` if the range ends past the
    /// last row.
    pub fn slice(&self, range: Range<usize>) -> Result<Self, DatasetError> {
        let len = self.rows();
        if range.end > len || range.start > range.end {
            return Err(DatasetError::IndexOutOfBounds {
                index: range.end,
                len,
            });
        }
        let flat = range.start * self.width..range.end * self.width;
        Ok(Self {
            values: map_values!(&self.values, v => v[flat.clone()].to_vec()),
            width: self.width,
            attrs: self.attrs.clone(),
        })
    }

    /// Repeats a single-row column `rows` times.
    ///
    /// Used for non-row-varying source variables.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::LengthMismatch` unless the column has exactly
    /// one row.
    pub fn broadcast(&self, variable: &str, rows: usize) -> Result<Self, DatasetError> {
        if self.rows() != 1 {
            return Err(DatasetError::LengthMismatch {
                variable: variable.to_string(),
                expected: 1,
                actual: self.rows(),
            });
        }
        self.take(&vec![0; rows])
    }

    /// Appends the rows of `other`.
    ///
    /// # Errors
    ///
    /// Fails on element type or width mismatch.
    pub fn append(&mut self, variable: &str, other: &Self) -> Result<(), DatasetError> {
        self.check_compatible(variable, other)?;
        match (&mut self.values, &other.values) {
            (Values::Float64(a), Values::Float64(b)) => a.extend_from_slice(b),
            (Values::Int64(a), Values::Int64(b)) | (Values::Timestamp(a), Values::Timestamp(b)) => {
                a.extend_from_slice(b);
            }
            (Values::Bool(a), Values::Bool(b)) => a.extend_from_slice(b),
            (Values::Text(a), Values::Text(b)) => a.extend_from_slice(b),
            _ => unreachable!("element types checked above"),
        }
        Ok(())
    }

    /// Overwrites the rows at `positions` with the rows of `source`.
    ///
    /// # Errors
    ///
    /// Fails on type or width mismatch, or when `source` does not have one
    /// row per position.
    pub fn scatter(
        &mut self,
        variable: &str,
        positions: &[usize],
        source: &Self,
    ) -> Result<(), DatasetError> {
        self.check_compatible(variable, source)?;
        if source.rows() != positions.len() {
            return Err(DatasetError::LengthMismatch {
                variable: variable.to_string(),
                expected: positions.len(),
                actual: source.rows(),
            });
        }
        let len = self.rows();
        if let Some(&index) = positions.iter().find(|&&index| index >= len) {
            return Err(DatasetError::IndexOutOfBounds { index, len });
        }
        let width = self.width;
        match (&mut self.values, &source.values) {
            (Values::Float64(a), Values::Float64(b)) => scatter(a, width, positions, b),
            (Values::Int64(a), Values::Int64(b)) | (Values::Timestamp(a), Values::Timestamp(b)) => {
                scatter(a, width, positions, b);
            }
            (Values::Bool(a), Values::Bool(b)) => scatter(a, width, positions, b),
            (Values::Text(a), Values::Text(b)) => scatter(a, width, positions, b),
            _ => unreachable!("element types checked above"),
        }
        Ok(())
    }

    /// Checks element type and width against another column.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` or `WidthMismatch`.
    pub fn check_compatible(&self, variable: &str, other: &Self) -> Result<(), DatasetError> {
        if self.element_type() != other.element_type() {
            return Err(DatasetError::TypeMismatch {
                variable: variable.to_string(),
                expected: self.element_type(),
                actual: other.element_type(),
            });
        }
        if self.width != other.width {
            return Err(DatasetError::WidthMismatch {
                variable: variable.to_string(),
                expected: self.width,
                actual: other.width,
            });
        }
        Ok(())
    }

    /// Returns per-row flags telling which rows contain a NaN component.
    ///
    /// Non-float columns have no NaN rows.
    #[must_use]
    pub fn nan_rows(&self) -> Vec<bool> {
        match &self.values {
            Values::Float64(v) if !v.is_empty() => v
                .chunks(self.width)
                .map(|row| row.iter().any(|x| x.is_nan()))
                .collect(),
            _ => vec![false; self.rows()],
        }
    }
}

fn gather<T: Clone>(values: &[T], width: usize, rows: &[usize]) -> Vec<T> {
    let mut out = Vec::with_capacity(rows.len() * width);
    for &row in rows {
        out.extend_from_slice(&values[row * width..(row + 1) * width]);
    }
    out
}

fn scatter<T: Clone>(target: &mut [T], width: usize, positions: &[usize], source: &[T]) {
    for (i, &row) in positions.iter().enumerate() {
        target[row * width..(row + 1) * width].clone_from_slice(&source[i * width..(i + 1) * width]);
    }
}

/// Row selection applied by [`Dataset::subset`](crate::Dataset::subset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every row.
    All,
    /// Rows whose flag is set; must have one flag per row.
    Mask(Vec<bool>),
    /// Explicit row indices, in output order.
    Indices(Vec<usize>),
    /// Contiguous row range.
    Range(Range<usize>),
}

impl Selection {
    /// Resolves the selection to explicit row indices.
    ///
    /// # Errors
    ///
    /// Returns `MaskLength` for a mask of the wrong size or
    /// `IndexOutOfBounds` for an index or range past `len`.
    pub fn to_indices(&self, len: usize) -> Result<Vec<usize>, DatasetError> {
        match self {
            Self::All => Ok((0..len).collect()),
            Self::Mask(mask) => {
                if mask.len() != len {
                    return Err(DatasetError::MaskLength {
                        expected: len,
                        actual: mask.len(),
                    });
                }
                Ok(mask
                    .iter()
                    .enumerate()
                    .filter_map(|(i, keep)| keep.then_some(i))
                    .collect())
            }
            Self::Indices(indices) => {
                if let Some(&index) = indices.iter().find(|&&index| index >= len) {
                    return Err(DatasetError::IndexOutOfBounds { index, len });
                }
                Ok(indices.clone())
            }
            Self::Range(range) => {
                if range.end > len {
                    return Err(DatasetError::IndexOutOfBounds {
                        index: range.end,
                        len,
                    });
                }
                Ok(range.clone().collect())
            }
        }
    }

    /// Returns true when the selection keeps every row unchanged.
    #[must_use]
    pub fn selects_all(&self, len: usize) -> bool {
        match self {
            Self::All => true,
            Self::Mask(mask) => mask.len() == len && mask.iter().all(|keep| *keep),
            Self::Indices(indices) => {
                indices.len() == len && indices.iter().enumerate().all(|(i, index)| i == *index)
            }
            Self::Range(range) => range.start == 0 && range.end == len,
        }
    }
}
