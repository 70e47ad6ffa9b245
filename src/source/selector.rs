//! Overlap resolution of listed records.
//!
//! Two policies exist and are kept apart on purpose:
//! - within one collection a later product supersedes the earlier one, so
//!   the earlier product is cut where the later one starts
//! - across collections the collection priority decides who owns the
//!   contested time

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::iter::Peekable;
use std::vec;

use chrono::{DateTime, Utc};

use super::Record;

/// Clips the records of one collection so that each ends where the next
/// one starts.
#[derive(Debug)]
pub struct SupersedingSelector {
    records: Peekable<vec::IntoIter<Record>>,
}

impl SupersedingSelector {
    pub fn new(mut records: Vec<Record>) -> Self {
        records.sort_by_key(|record| record.start);
        Self {
            records: records.into_iter().peekable(),
        }
    }
}

impl Iterator for SupersedingSelector {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let mut record = self.records.next()?;
        if let Some(next) = self.records.peek() {
            if record.end > next.start {
                record.end = next.start;
            }
        }
        Some(record)
    }
}

/// Heap entry ordered by start, then priority, then insertion.
#[derive(Debug)]
struct Queued {
    start: DateTime<Utc>,
    priority: usize,
    seq: u64,
    record: Record,
}

impl Queued {
    fn key(&self) -> (DateTime<Utc>, usize, u64) {
        (self.start, self.priority, self.seq)
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Merges records of several collections by priority.
///
/// Records are taken in start order (lower priority index first on equal
/// starts) and compared against the pending record:
/// - without overlap the pending record is emitted
/// - a record of equal or higher priority cuts the pending record at its
///   start; any part of the pending record beyond its end is queued again
/// - a record of lower priority loses the overlap; its part beyond the
///   pending record's end is queued again
///
/// The output is sorted and pairwise disjoint, covers the union of the
/// inputs, and assigns every instant to the best collection covering it.
#[derive(Debug)]
pub struct PrioritySelector {
    queue: BinaryHeap<Reverse<Queued>>,
    pending: Option<Record>,
    seq: u64,
}

impl PrioritySelector {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        let mut selector = Self {
            queue: BinaryHeap::new(),
            pending: None,
            seq: 0,
        };
        for record in records {
            selector.push(record);
        }
        selector
    }

    fn push(&mut self, record: Record) {
        if record.is_empty() {
            return;
        }
        self.seq += 1;
        self.queue.push(Reverse(Queued {
            start: record.start,
            priority: record.priority,
            seq: self.seq,
            record,
        }));
    }

    fn pop(&mut self) -> Option<Record> {
        self.queue.pop().map(|Reverse(queued)| queued.record)
    }
}

impl Iterator for PrioritySelector {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            let Some(record) = self.pop() else {
                return self.pending.take();
            };
            let Some(pending) = self.pending.take() else {
                self.pending = Some(record);
                continue;
            };

            if pending.end <= record.start {
                self.pending = Some(record);
                return Some(pending);
            }

            if record.priority <= pending.priority {
                if pending.end > record.end {
                    self.push(pending.clipped(record.end, pending.end));
                }
                let head = pending.clipped(pending.start, record.start);
                self.pending = Some(record);
                if !head.is_empty() {
                    return Some(head);
                }
            } else {
                if record.end > pending.end {
                    self.push(record.clipped(pending.end, record.end));
                }
                self.pending = Some(pending);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::source::ProductRecord;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn record(priority: usize, id: &str, start: i64, end: i64) -> Record {
        Record::from_product(
            priority,
            ProductRecord::new(id, format!("C{priority}"), at(start), at(end)),
        )
    }

    fn spans(records: impl Iterator<Item = Record>) -> Vec<(String, i64, i64)> {
        records
            .map(|r| {
                (
                    r.identifier().to_string(),
                    (r.start - at(0)).num_minutes(),
                    (r.end - at(0)).num_minutes(),
                )
            })
            .collect()
    }

    fn span(id: &str, start: i64, end: i64) -> (String, i64, i64) {
        (id.to_string(), start, end)
    }

    #[test]
    fn test_superseding_cuts_earlier_record() {
        let selector = SupersedingSelector::new(vec![
            record(0, "b", 8, 20),
            record(0, "a", 0, 10),
            record(0, "c", 25, 30),
        ]);
        assert_eq!(
            spans(selector),
            vec![span("a", 0, 8), span("b", 8, 20), span("c", 25, 30)]
        );
    }

    #[test]
    fn test_priority_lower_collection_fills_tail() {
        let selector = PrioritySelector::new([record(0, "a", 0, 10), record(1, "b", 5, 15)]);
        assert_eq!(spans(selector), vec![span("a", 0, 10), span("b", 10, 15)]);
    }

    #[test]
    fn test_priority_higher_collection_cuts_pending() {
        let selector = PrioritySelector::new([record(1, "b", 0, 10), record(0, "a", 5, 15)]);
        assert_eq!(spans(selector), vec![span("b", 0, 5), span("a", 5, 15)]);
    }

    #[test]
    fn test_priority_nested_record_keeps_remainder() {
        let selector = PrioritySelector::new([record(1, "b", 0, 30), record(0, "a", 10, 20)]);
        assert_eq!(
            spans(selector),
            vec![span("b", 0, 10), span("a", 10, 20), span("b", 20, 30)]
        );
    }

    #[test]
    fn test_priority_equal_start_prefers_priority() {
        let selector = PrioritySelector::new([record(1, "b", 0, 20), record(0, "a", 0, 10)]);
        assert_eq!(spans(selector), vec![span("a", 0, 10), span("b", 10, 20)]);
    }

    #[test]
    fn test_priority_three_collections() {
        let selector = PrioritySelector::new([
            record(0, "a", 0, 10),
            record(1, "b", 5, 20),
            record(2, "c", 3, 30),
        ]);
        assert_eq!(
            spans(selector),
            vec![span("a", 0, 10), span("b", 10, 20), span("c", 20, 30)]
        );
    }

    #[test]
    fn test_priority_empty() {
        assert_eq!(PrioritySelector::new(Vec::new()).count(), 0);
    }
}
