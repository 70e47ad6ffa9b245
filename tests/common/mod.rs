#![allow(dead_code)]

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use timefuse::storage::{InMemoryColumnReader, InMemoryRecordRepository};
use timefuse::time::{datetime_to_micros, micros_to_datetime};
use timefuse::{
    Column, Dataset, ElementType, FusionResult, InterpolationKind, Model, ProductParameters, ProductRecord,
    ProductSource, ProductTimeSeries, Provenance, SourceSpan, TimeRange, Values, VariableDefinition,
};

pub const S: i64 = 1_000_000;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn us(seconds: i64) -> i64 {
    datetime_to_micros(t0()) + seconds * S
}

pub fn window(start: i64, end: i64) -> TimeRange {
    TimeRange::new(t0() + Duration::seconds(start), t0() + Duration::seconds(end)).unwrap()
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// Magnetic products (`MAG`, 1 s cadence, `B_NEC = [3s, 4s, 0]` so that
/// the intensity is `5s`) and index products (`AUX`, `Kp`).
pub struct Archive {
    pub repository: Arc<InMemoryRecordRepository>,
    pub reader: Arc<InMemoryColumnReader>,
}

impl Archive {
    pub fn new() -> Self {
        Self {
            repository: Arc::new(InMemoryRecordRepository::new()),
            reader: Arc::new(InMemoryColumnReader::new()),
        }
    }

    fn insert(&self, id: &str, collection: &str, times: &[i64]) {
        let record = ProductRecord::new(
            id,
            collection,
            micros_to_datetime(times[0]),
            micros_to_datetime(times[times.len() - 1] + 1),
        );
        self.repository.insert(record).unwrap();
        self.reader
            .insert(id, "Timestamp", Column::from_timestamps(times.to_vec()))
            .unwrap();
    }

    pub fn add_mag(&self, id: &str, seconds: Range<i64>) {
        let times: Vec<i64> = seconds.clone().map(us).collect();
        self.insert(id, "MAG", &times);
        #[allow(clippy::cast_precision_loss)]
        let values: Vec<f64> = seconds.flat_map(|s| [3.0 * s as f64, 4.0 * s as f64, 0.0]).collect();
        self.reader
            .insert(id, "B_NEC", Column::vector(Values::Float64(values), 3).unwrap())
            .unwrap();
    }

    pub fn add_aux(&self, id: &str, seconds: &[i64], kp: &[f64]) {
        self.add_index(id, "AUX", "Kp", seconds, kp);
    }

    pub fn add_dst(&self, id: &str, seconds: &[i64], dst: &[f64]) {
        self.add_index(id, "DST", "Dst", seconds, dst);
    }

    fn add_index(&self, id: &str, collection: &str, variable: &str, seconds: &[i64], values: &[f64]) {
        let times: Vec<i64> = seconds.iter().map(|&s| us(s)).collect();
        self.insert(id, collection, &times);
        self.reader.insert(id, variable, Column::from_f64(values.to_vec())).unwrap();
    }

    pub fn mag_series(&self) -> Arc<ProductTimeSeries> {
        Arc::new(
            ProductTimeSeries::new(
                ProductSource::single(Arc::clone(&self.repository) as _, "MAG"),
                Arc::clone(&self.reader) as _,
                vec![
                    VariableDefinition::new("Timestamp", ElementType::Timestamp),
                    VariableDefinition::new("B_NEC", ElementType::Float64).with_width(3),
                ],
                ProductParameters::default(),
            )
            .unwrap(),
        )
    }

    pub fn aux_series(&self) -> Arc<ProductTimeSeries> {
        self.index_series("AUX", "Kp", InterpolationKind::Previous)
    }

    /// `Dst` interpolated linearly.
    pub fn dst_series(&self) -> Arc<ProductTimeSeries> {
        self.index_series("DST", "Dst", InterpolationKind::Linear)
    }

    fn index_series(&self, collection: &str, variable: &str, kind: InterpolationKind) -> Arc<ProductTimeSeries> {
        Arc::new(
            ProductTimeSeries::new(
                ProductSource::single(Arc::clone(&self.repository) as _, collection),
                Arc::clone(&self.reader) as _,
                vec![
                    VariableDefinition::new("Timestamp", ElementType::Timestamp),
                    VariableDefinition::new(variable, ElementType::Float64),
                ],
                ProductParameters::default().with_kinds(kind, &[variable]),
            )
            .unwrap(),
        )
    }
}

/// Scaled intensity of `B_NEC` computed from a named coefficient set.
#[derive(Debug)]
pub struct ScaledIntensity {
    variables: [String; 1],
    required: [String; 1],
    coefficients: Mutex<(String, f64)>,
}

impl ScaledIntensity {
    pub fn new(source: &str, scale: f64) -> Self {
        Self {
            variables: ["F_model".to_string()],
            required: ["B_NEC".to_string()],
            coefficients: Mutex::new((source.to_string(), scale)),
        }
    }

    pub fn update(&self, source: &str, scale: f64) {
        *self.coefficients.lock().unwrap() = (source.to_string(), scale);
    }
}

impl Model for ScaledIntensity {
    fn name(&self) -> &str {
        "ScaledIntensity"
    }

    fn variables(&self) -> &[String] {
        &self.variables
    }

    fn required_variables(&self) -> &[String] {
        &self.required
    }

    fn eval(&self, dataset: &Dataset, _variables: Option<&[String]>) -> FusionResult<Dataset> {
        let scale = self.coefficients.lock().unwrap().1;
        let values = dataset
            .require("B_NEC")?
            .as_f64()
            .unwrap()
            .chunks(3)
            .map(|row| scale * row.iter().map(|x| x * x).sum::<f64>().sqrt())
            .collect();
        let mut output = Dataset::new();
        output.set("F_model", Column::from_f64(values))?;
        Ok(output)
    }

    fn sources(&self, window: &TimeRange) -> Provenance {
        let source = self.coefficients.lock().unwrap().0.clone();
        Provenance::new([SourceSpan::new(source, window.start, window.end)])
    }

    fn products(&self) -> BTreeSet<String> {
        BTreeSet::from([self.coefficients.lock().unwrap().0.clone()])
    }
}

pub fn values(dataset: &Dataset, variable: &str) -> Vec<f64> {
    dataset.get(variable).unwrap().as_f64().unwrap().to_vec()
}

/// Seconds since `t0` of the time column.
pub fn seconds(dataset: &Dataset) -> Vec<i64> {
    dataset
        .times("Timestamp")
        .unwrap()
        .iter()
        .map(|t| (t - datetime_to_micros(t0())) / S)
        .collect()
}
