mod common;

use std::sync::Arc;

use common::{seconds, strings, values, window, Archive};
use timefuse::filter::ScalarRangeFilter;
use timefuse::model::{Identity, VectorIntensity};
use timefuse::{FusionError, Pipeline, PipelineConfig, PipelineError, TimeSeries, VariableResolver};

/// `MAG` in two products of 30 s and `AUX` with `Kp` every 10 s:
/// `Kp` is 1 for [0, 20), 5 for [20, 40) and 2 from 40 s.
fn archive() -> Archive {
    let archive = Archive::new();
    archive.add_mag("M1", 0..30);
    archive.add_mag("M2", 30..60);
    archive.add_aux(
        "A1",
        &[0, 10, 20, 30, 40, 50, 60],
        &[1.0, 1.0, 5.0, 5.0, 2.0, 2.0, 2.0],
    );
    archive
}

fn resolver(archive: &Archive, output: &[&str]) -> VariableResolver {
    let mut resolver = VariableResolver::new();
    resolver.add_master(archive.mag_series() as Arc<dyn TimeSeries>).unwrap();
    resolver.add_slave(archive.aux_series() as Arc<dyn TimeSeries>).unwrap();
    resolver.add_model(Arc::new(VectorIntensity::new("B_NEC", "F")));
    resolver.add_filter(Arc::new(ScalarRangeFilter::new("Kp", 0.0, 3.0)));
    let output = strings(output);
    resolver.add_output_variables(Some(output.as_slice()));
    resolver
}

#[test]
fn fuses_master_slave_model_and_filter_per_product() {
    let archive = archive();
    let pipeline = Pipeline::new(resolver(&archive, &["Timestamp", "F", "Kp"]), PipelineConfig::default());

    let chunks: Vec<_> = pipeline
        .evaluate(&window(0, 60))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(chunks.len(), 2);

    let first = &chunks[0];
    assert_eq!(first.names().collect::<Vec<_>>(), vec!["Timestamp", "F", "Kp"]);
    assert_eq!(seconds(first), (0..20).collect::<Vec<_>>());
    assert!(values(first, "Kp").iter().all(|&kp| (kp - 1.0).abs() < 1e-12));

    let second = &chunks[1];
    assert_eq!(seconds(second), (40..60).collect::<Vec<_>>());
    assert!(values(second, "Kp").iter().all(|&kp| (kp - 2.0).abs() < 1e-12));
    for (s, f) in seconds(second).into_iter().zip(values(second, "F")) {
        #[allow(clippy::cast_precision_loss)]
        let expected = 5.0 * s as f64;
        assert!((f - expected).abs() < 1e-9, "F at {s} s: {f}");
    }

    let products = pipeline.resolver().products();
    assert!(["M1", "M2", "A1"].iter().all(|p| products.contains(*p)));
}

/// `archive()` plus `DST` every 10 s with `Dst = -s`.
fn archive_with_dst() -> Archive {
    let archive = archive();
    let seconds = [0, 10, 20, 30, 40, 50, 60];
    #[allow(clippy::cast_precision_loss)]
    let dst: Vec<f64> = seconds.iter().map(|&s| -(s as f64)).collect();
    archive.add_dst("D1", &seconds, &dst);
    archive
}

fn two_slave_resolver(archive: &Archive, output: &[&str]) -> VariableResolver {
    let mut resolver = VariableResolver::new();
    resolver.add_master(archive.mag_series() as Arc<dyn TimeSeries>).unwrap();
    resolver.add_slave(archive.aux_series() as Arc<dyn TimeSeries>).unwrap();
    resolver.add_slave(archive.dst_series() as Arc<dyn TimeSeries>).unwrap();
    resolver.add_filter(Arc::new(ScalarRangeFilter::new("Kp", 0.0, 3.0)));
    let output = strings(output);
    resolver.add_output_variables(Some(output.as_slice()));
    resolver
}

fn assert_dst_matches_time(dataset: &timefuse::Dataset) {
    for (s, dst) in seconds(dataset).into_iter().zip(values(dataset, "Dst")) {
        #[allow(clippy::cast_precision_loss)]
        let expected = -(s as f64);
        assert!((dst - expected).abs() < 1e-9, "Dst at {s} s: {dst}");
    }
}

#[test]
fn later_slaves_follow_rows_dropped_by_earlier_filters() {
    let archive = archive_with_dst();
    let pipeline = Pipeline::new(
        two_slave_resolver(&archive, &["Timestamp", "Kp", "Dst"]),
        PipelineConfig::default(),
    );
    assert_eq!(pipeline.resolver().slaves().len(), 2);

    let dataset = pipeline.collect(&window(0, 60)).unwrap();
    let expected: Vec<i64> = (0..20).chain(40..60).collect();
    assert_eq!(seconds(&dataset), expected);
    assert!(values(&dataset, "Kp").iter().all(|&kp| kp <= 3.0));
    assert_dst_matches_time(&dataset);
}

#[test]
fn filters_on_both_slaves_narrow_in_turn() {
    let archive = archive_with_dst();
    let mut resolver = two_slave_resolver(&archive, &["Timestamp", "Dst"]);
    resolver.add_filter(Arc::new(ScalarRangeFilter::new("Dst", -50.0, -10.0)));
    let pipeline = Pipeline::new(resolver, PipelineConfig::default());

    let chunks: Vec<_> = pipeline
        .evaluate(&window(0, 60))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(seconds(&chunks[0]), (10..20).collect::<Vec<_>>());
    assert_eq!(seconds(&chunks[1]), (40..=50).collect::<Vec<_>>());
    for chunk in &chunks {
        assert_dst_matches_time(chunk);
    }
}

#[test]
fn window_inside_one_product_yields_one_chunk() {
    let archive = archive();
    let pipeline = Pipeline::new(resolver(&archive, &["Timestamp", "F"]), PipelineConfig::default());

    let dataset = pipeline.collect(&window(5, 15)).unwrap();
    assert_eq!(seconds(&dataset), (5..15).collect::<Vec<_>>());
    assert_eq!(dataset.variable_count(), 2);
}

#[test]
fn unresolvable_filter_rejects_every_row() {
    let archive = archive();
    let mut resolver = resolver(&archive, &["Timestamp", "F"]);
    resolver.add_filter(Arc::new(ScalarRangeFilter::new("Dst", -50.0, 50.0)));
    assert_eq!(resolver.unresolved_filters().len(), 1);

    let pipeline = Pipeline::new(resolver, PipelineConfig::default());
    let dataset = pipeline.collect(&window(0, 60)).unwrap();
    assert!(dataset.is_empty());
    assert!(dataset.contains("F"));
}

#[test]
fn unresolved_model_output_is_left_out() {
    let archive = archive();
    let mut resolver = VariableResolver::new();
    resolver.add_master(archive.mag_series() as Arc<dyn TimeSeries>).unwrap();
    resolver.add_model(Arc::new(Identity::new("Radius", "R")));
    resolver.add_output_variables(Some(&strings(&["Timestamp", "R"])[..]));

    let pipeline = Pipeline::new(resolver, PipelineConfig::default());
    assert_eq!(pipeline.output_variables(), ["Timestamp".to_string()]);
    assert!(pipeline.resolver().models().is_empty());

    let dataset = pipeline.collect(&window(0, 60)).unwrap();
    assert_eq!(dataset.len(), 60);
    assert!(!dataset.contains("R"));
}

#[test]
fn sample_limit_covers_the_whole_response() {
    let archive = archive();
    let config = PipelineConfig { max_samples: 30 };
    let pipeline = Pipeline::new(resolver(&archive, &["Timestamp", "F"]), config);

    let mut chunks = pipeline.evaluate(&window(0, 60)).unwrap();
    assert_eq!(chunks.next().unwrap().unwrap().len(), 20);
    let err = chunks.next().unwrap().unwrap_err();
    assert!(matches!(
        err,
        FusionError::Pipeline(PipelineError::SampleLimitExceeded { limit: 30 })
    ));
    assert!(chunks.next().is_none());

    assert!(pipeline.collect(&window(0, 60)).is_err());
}

#[test]
fn evaluation_needs_a_master() {
    let pipeline = Pipeline::new(VariableResolver::new(), PipelineConfig::default());
    assert!(pipeline.evaluate(&window(0, 60)).is_err());
}
