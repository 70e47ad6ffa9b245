use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use timefuse::storage::InMemoryRecordRepository;
use timefuse::{ProductRecord, ProductSource, Record, TimeRange};

fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + Duration::minutes(minute)
}

fn window(start: i64, end: i64) -> TimeRange {
    TimeRange::new(at(start), at(end)).unwrap()
}

fn spans(records: &[Record]) -> Vec<(String, i64, i64)> {
    records
        .iter()
        .map(|r| {
            (
                r.payload.collection.clone(),
                (r.start - at(0)).num_minutes(),
                (r.end - at(0)).num_minutes(),
            )
        })
        .collect()
}

#[test]
fn two_collections_split_contested_time() {
    let repository = Arc::new(InMemoryRecordRepository::new());
    repository.insert(ProductRecord::new("A1", "A", at(0), at(10))).unwrap();
    repository.insert(ProductRecord::new("B1", "B", at(5), at(15))).unwrap();
    let source = ProductSource::new(repository, vec!["A".to_string(), "B".to_string()]).unwrap();

    let records: Vec<Record> = source.iter_records(&window(0, 15), Duration::zero()).unwrap().collect();
    assert_eq!(
        spans(&records),
        vec![("A".to_string(), 0, 10), ("B".to_string(), 10, 15)]
    );
}

#[test]
fn swapped_priority_gives_b_the_overlap() {
    let repository = Arc::new(InMemoryRecordRepository::new());
    repository.insert(ProductRecord::new("A1", "A", at(0), at(10))).unwrap();
    repository.insert(ProductRecord::new("B1", "B", at(5), at(15))).unwrap();
    let source = ProductSource::new(repository, vec!["B".to_string(), "A".to_string()]).unwrap();

    let records: Vec<Record> = source.iter_records(&window(0, 15), Duration::zero()).unwrap().collect();
    assert_eq!(
        spans(&records),
        vec![("A".to_string(), 0, 5), ("B".to_string(), 5, 15)]
    );
}

#[test]
fn single_collection_later_record_supersedes() {
    let repository = Arc::new(InMemoryRecordRepository::new());
    repository.insert(ProductRecord::new("P1", "MAG", at(0), at(10))).unwrap();
    repository.insert(ProductRecord::new("P2", "MAG", at(8), at(20))).unwrap();
    let source = ProductSource::single(repository, "MAG");

    let records: Vec<Record> = source.iter_records(&window(0, 20), Duration::zero()).unwrap().collect();
    let identifiers: Vec<&str> = records.iter().map(Record::identifier).collect();
    assert_eq!(identifiers, vec!["P1", "P2"]);
    assert_eq!(records[0].end, at(8));
    assert_eq!(records[1].start, at(8));
}

/// Small deterministic generator (xorshift64).
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, bound: i64) -> i64 {
        i64::try_from(self.next() % u64::try_from(bound).unwrap()).unwrap()
    }
}

/// Priority index of the first collection covering minute `m`.
fn owner(intervals: &[Vec<(i64, i64)>], m: i64) -> Option<usize> {
    intervals
        .iter()
        .position(|list| list.iter().any(|&(start, end)| start <= m && m < end))
}

#[test]
fn random_collections_resolve_to_highest_priority() {
    let mut rng = Rng(0x9e37_79b9_7f4a_7c15);
    for case in 0..200 {
        let collections = 1 + rng.below(4);
        let repository = Arc::new(InMemoryRecordRepository::new());
        let mut intervals: Vec<Vec<(i64, i64)>> = Vec::new();
        let mut names = Vec::new();

        for c in 0..collections {
            let name = format!("C{c}");
            repository.create_collection(&name).unwrap();
            let mut list = Vec::new();
            let mut cursor = rng.below(10);
            for i in 0..rng.below(6) {
                let start = cursor + rng.below(5);
                let end = start + 1 + rng.below(12);
                repository
                    .insert(ProductRecord::new(format!("{name}-{i}"), name.clone(), at(start), at(end)))
                    .unwrap();
                list.push((start, end));
                cursor = end;
            }
            intervals.push(list);
            names.push(name);
        }

        let start = rng.below(30);
        let end = start + 1 + rng.below(60);
        let source = if names.len() == 1 {
            ProductSource::single(Arc::clone(&repository) as _, names[0].clone())
        } else {
            ProductSource::new(Arc::clone(&repository) as _, names.clone()).unwrap()
        };
        let records: Vec<Record> = source
            .iter_records(&window(start, end), Duration::zero())
            .unwrap()
            .collect();

        for pair in records.windows(2) {
            assert!(pair[0].start < pair[1].start, "case {case}: unsorted {:?}", spans(&records));
            assert!(pair[0].end <= pair[1].start, "case {case}: overlap {:?}", spans(&records));
        }
        for record in &records {
            assert!(record.start < record.end, "case {case}: empty span");
            assert!(record.start >= at(start) && record.end <= at(end), "case {case}: outside window");
        }

        for m in start..end {
            let covering = records
                .iter()
                .find(|r| r.start <= at(m) && at(m) < r.end)
                .map(|r| r.priority);
            assert_eq!(
                covering,
                owner(&intervals, m),
                "case {case}: minute {m}, records {:?}, inputs {intervals:?}",
                spans(&records)
            );
        }
    }
}
