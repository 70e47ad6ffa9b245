mod common;

use std::sync::Arc;

use common::{window, Archive, ScaledIntensity};
use timefuse::maintenance::CacheCounts;
use timefuse::storage::InMemoryCacheStore;
use timefuse::{
    CacheMaintenance, CacheStore, MaintenanceConfig, MaintenanceReport, Model, RecordSelector, SourceModel,
};

struct Fixture {
    archive: Archive,
    model: Arc<ScaledIntensity>,
    cache: Arc<InMemoryCacheStore>,
    maintenance: CacheMaintenance,
}

fn fixture() -> Fixture {
    let archive = Archive::new();
    archive.add_mag("M1", 0..30);
    archive.add_mag("M2", 30..60);
    archive.add_mag("M3", 60..90);
    let model = Arc::new(ScaledIntensity::new("COEFF-v1", 1.0));
    let cache = Arc::new(InMemoryCacheStore::new());
    let maintenance = CacheMaintenance::new(
        archive.mag_series(),
        Arc::clone(&cache) as Arc<dyn CacheStore>,
        vec![SourceModel::new(Arc::clone(&model) as Arc<dyn Model>, "F_model").unwrap()],
        &MaintenanceConfig::with_workers(3),
    )
    .unwrap();
    Fixture {
        archive,
        model,
        cache,
        maintenance,
    }
}

fn all() -> RecordSelector {
    RecordSelector::new(".*").unwrap()
}

fn report(processed: usize, skipped: usize, failed: usize) -> MaintenanceReport {
    MaintenanceReport {
        processed,
        skipped,
        failed,
    }
}

fn counts(fixture: &Fixture) -> CacheCounts {
    let statistics = fixture.maintenance.cache_statistics(&all()).unwrap();
    assert_eq!(statistics.failed, 0);
    statistics.models["ScaledIntensity"]
}

#[test]
fn seeding_skips_current_products_unless_forced() {
    let fixture = fixture();
    assert_eq!(counts(&fixture).missing, 3);

    assert_eq!(fixture.maintenance.seed_cache(&all(), false).unwrap(), report(3, 0, 0));
    assert_eq!(fixture.cache.len().unwrap(), 3);
    assert_eq!(counts(&fixture).seeded, 3);

    assert_eq!(fixture.maintenance.seed_cache(&all(), false).unwrap(), report(0, 3, 0));
    assert_eq!(fixture.maintenance.seed_cache(&all(), true).unwrap(), report(3, 0, 0));
}

#[test]
fn seeded_column_matches_product_rows() {
    let fixture = fixture();
    fixture
        .maintenance
        .seed_cache(&RecordSelector::new("M2").unwrap(), false)
        .unwrap();

    let column = fixture.cache.read_column("M2", "ScaledIntensity").unwrap().unwrap();
    let values = column.as_f64().unwrap();
    assert_eq!(values.len(), 30);
    assert!((values[0] - 150.0).abs() < 1e-9);
    assert!((values[29] - 295.0).abs() < 1e-9);

    let provenance = fixture.cache.read_provenance("M2", "ScaledIntensity").unwrap().unwrap();
    assert!(provenance.names().contains("COEFF-v1"));
}

#[test]
fn changed_sources_make_entries_obsolete() {
    let fixture = fixture();
    fixture.maintenance.seed_cache(&all(), false).unwrap();
    fixture.model.update("COEFF-v2", 1.0);

    let current = counts(&fixture);
    assert_eq!((current.seeded, current.obsolete, current.missing), (0, 3, 0));
    assert_eq!(fixture.maintenance.seed_cache(&all(), false).unwrap(), report(3, 0, 0));
    assert_eq!(counts(&fixture).seeded, 3);
}

#[test]
fn flush_removes_selected_entries() {
    let fixture = fixture();
    fixture.maintenance.seed_cache(&all(), false).unwrap();

    let selector = RecordSelector::new("^M[12]$").unwrap();
    assert_eq!(fixture.maintenance.flush_cache(&selector).unwrap(), report(2, 0, 0));
    assert_eq!(fixture.maintenance.flush_cache(&selector).unwrap(), report(0, 2, 0));

    let counts = counts(&fixture);
    assert_eq!((counts.seeded, counts.missing), (1, 2));
}

#[test]
fn window_restricts_the_selection() {
    let fixture = fixture();
    let selector = all().with_window(window(35, 65));
    assert_eq!(fixture.maintenance.seed_cache(&selector, false).unwrap(), report(2, 0, 0));
    assert!(fixture.cache.read_provenance("M1", "ScaledIntensity").unwrap().is_none());
}

#[test]
fn broken_product_is_counted_and_the_job_continues() {
    let fixture = fixture();
    fixture.archive.reader.mark_broken("M2", "truncated file").unwrap();

    assert_eq!(fixture.maintenance.seed_cache(&all(), false).unwrap(), report(2, 0, 1));
    assert!(fixture.cache.read_column("M2", "ScaledIntensity").unwrap().is_none());
    assert_eq!(counts(&fixture).missing, 1);
}

#[test]
fn invalid_pattern_is_rejected() {
    assert!(RecordSelector::new("(").is_err());
}
