use serde::{Deserialize, Serialize};

/// One row of the final-grades table. All cells are strings; a cell absent in
/// the source table is an empty string. `course_code` is the identity key for
/// change detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub semester: String,
    pub course_code: String,
    pub course_id: String,
    pub course_name: String,
    pub course_type: String,
    pub credit: String,
    pub final_exam_score: String,
    pub overall_score: String,
    pub makeup_score: String,
    pub final_score: String,
    pub gpa: String,
}

/// One row of the periodic ("usual") grades table. Fetched by the one-shot
/// probe only; the monitor loop watches final grades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsualGradeRecord {
    pub semester: String,
    pub course_code: String,
    pub course_id: String,
    pub course_name: String,
    pub course_type: String,
    pub credit: String,
    pub usual_score: String,
}
