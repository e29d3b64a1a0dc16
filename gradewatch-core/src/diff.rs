//! Added-record computation between two snapshots.
//!
//! Membership is decided by course code alone:
//! - A record is added iff its code is absent from the baseline's key set
//! - A changed score under an existing code is not a membership change
//! - An empty baseline means every current record is added (first run)

use std::collections::HashSet;

use crate::models::{GradeRecord, Snapshot};

/// Records of `current` whose course code does not appear in `baseline`,
/// in `current`'s order. Pure function, no I/O.
pub fn added(baseline: &Snapshot, current: &Snapshot) -> Vec<GradeRecord> {
    let known: HashSet<&str> = baseline
        .records()
        .iter()
        .map(|r| r.course_code.as_str())
        .collect();

    current
        .records()
        .iter()
        .filter(|r| !known.contains(r.course_code.as_str()))
        .cloned()
        .collect()
}
