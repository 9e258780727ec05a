//! Ranked value lists per field.
//!
//! Chain search and interactive selection both work from a bounded list of
//! the most common values of each field rather than every value ever seen.

use crate::record::{Field, FieldValue, Record};
use ahash::AHashMap;
use itertools::Itertools;
use std::cmp::Reverse;

/// The most frequent values of each field in a record set.
///
/// Values are ranked by descending frequency; equal frequencies keep the
/// order in which the values were first encountered. Absent values and the
/// `Unspecified` placeholder never enter a domain. A table is built once per
/// record set and is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainTable {
    cap: usize,
    values: [Vec<FieldValue>; 5],
}

impl DomainTable {
    /// Builds the table keeping at most `cap` values per field.
    pub fn build(records: &[Record], cap: usize) -> Self {
        let values = Field::ALL.map(|field| rank_values(records, field, cap));
        for field in Field::ALL {
            log::debug!(
                "Domain for {}: {} values kept (cap {}).",
                field,
                values[field.index()].len(),
                cap
            );
        }
        Self { cap, values }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Ranked values of one field.
    pub fn values(&self, field: Field) -> &[FieldValue] {
        &self.values[field.index()]
    }

    /// Every field with its ranked values, in canonical field order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &[FieldValue])> + '_ {
        Field::ALL
            .into_iter()
            .map(move |field| (field, self.values(field)))
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Vec::is_empty)
    }
}

fn rank_values(records: &[Record], field: Field, cap: usize) -> Vec<FieldValue> {
    // value -> (count, first position seen)
    let mut tally: AHashMap<FieldValue, (usize, usize)> = AHashMap::new();
    for (position, record) in records.iter().enumerate() {
        let Some(value) = record.conditions.get(field) else {
            continue;
        };
        if value.is_unspecified() {
            continue;
        }
        tally.entry(value).or_insert((0, position)).0 += 1;
    }

    tally
        .into_iter()
        .sorted_unstable_by_key(|(_, (count, first))| (Reverse(*count), *first))
        .take(cap)
        .map(|(value, _)| value)
        .collect()
}
