use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::grade::GradeRecord;

/// The full set of grade rows returned by one probe, in page order.
///
/// Immutable once built. A repeated course code within one fetch is collapsed
/// at construction: the last occurrence's content wins, the first occurrence's
/// position is kept. Serializes as a bare array of records, which is also the
/// on-disk baseline layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Snapshot {
    records: Vec<GradeRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<GradeRecord>) -> Self {
        let mut slots: HashMap<String, usize> = HashMap::with_capacity(records.len());
        let mut deduped: Vec<GradeRecord> = Vec::with_capacity(records.len());
        for record in records {
            match slots.get(&record.course_code) {
                Some(&i) => deduped[i] = record,
                None => {
                    slots.insert(record.course_code.clone(), deduped.len());
                    deduped.push(record);
                }
            }
        }
        Self { records: deduped }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[GradeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
