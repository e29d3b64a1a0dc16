pub mod grade;
pub mod snapshot;

pub use grade::{GradeRecord, UsualGradeRecord};
pub use snapshot::Snapshot;
