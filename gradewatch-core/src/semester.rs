//! Term-id arithmetic for the records service.
//!
//! The service numbers semesters with an affine code anchored at the
//! 2013-2014 academic year:
//!
//!   first-term id  = (start_year - 2013) * 40 + 3
//!   second-term id = first-term id + 20
//!
//! so 2023-2024 is 403 (term 1) and 423 (term 2). Everything here is pure;
//! callers pass today's date in when they want the current term.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BASE_START_YEAR: i32 = 2013;
const BASE_TERM_ID: i32 = 3;
const YEAR_STEP: i32 = 40;
const TERM_STEP: i32 = 20;

/// First term starts in September; second term starts in February. Used to
/// infer the current term locally instead of trusting the page's default
/// dropdown selection.
const FIRST_TERM_START_MONTH: u32 = 9;
const SECOND_TERM_START_MONTH: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    First,
    Second,
}

impl Term {
    pub fn number(self) -> u8 {
        match self {
            Term::First => 1,
            Term::Second => 2,
        }
    }
}

#[derive(Error, Debug)]
pub enum SemesterError {
    #[error("Start year {0} is before the service epoch year 2013")]
    YearOutOfRange(i32),

    #[error("Year range '{0}' must look like '2024-2025' with consecutive years")]
    InvalidYearRange(String),
}

/// Term id for an academic year's first or second term.
pub fn term_id(start_year: i32, term: Term) -> Result<i32, SemesterError> {
    if start_year < BASE_START_YEAR {
        return Err(SemesterError::YearOutOfRange(start_year));
    }
    let first = (start_year - BASE_START_YEAR) * YEAR_STEP + BASE_TERM_ID;
    Ok(match term {
        Term::First => first,
        Term::Second => first + TERM_STEP,
    })
}

/// Inverse of [`term_id`]. `None` for ids that match neither term form.
pub fn decode(id: i32) -> Option<(i32, Term)> {
    let raw = id - BASE_TERM_ID;
    if raw >= 0 && raw % YEAR_STEP == 0 {
        return Some((BASE_START_YEAR + raw / YEAR_STEP, Term::First));
    }
    let raw = id - (BASE_TERM_ID + TERM_STEP);
    if raw >= 0 && raw % YEAR_STEP == 0 {
        return Some((BASE_START_YEAR + raw / YEAR_STEP, Term::Second));
    }
    None
}

/// The academic term a given date falls in. January counts as the first term
/// of the previous academic year.
pub fn academic_term(date: NaiveDate) -> (i32, Term) {
    let year = date.year();
    let month = date.month();

    if month >= FIRST_TERM_START_MONTH {
        (year, Term::First)
    } else if month >= SECOND_TERM_START_MONTH {
        (year - 1, Term::Second)
    } else {
        (year - 1, Term::First)
    }
}

/// Term id for the term `date` falls in.
pub fn current_term_id(date: NaiveDate) -> Result<i32, SemesterError> {
    let (start_year, term) = academic_term(date);
    term_id(start_year, term)
}

/// Start year of a "YYYY-YYYY" academic-year range. The end year must be the
/// start year plus one.
pub fn parse_year_range(year_range: &str) -> Result<i32, SemesterError> {
    let invalid = || SemesterError::InvalidYearRange(year_range.to_string());

    let mut parts = year_range.trim().splitn(2, '-');
    let start: i32 = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .ok_or_else(invalid)?;
    let end: i32 = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .ok_or_else(invalid)?;

    if end != start + 1 {
        return Err(invalid());
    }
    Ok(start)
}

pub fn year_range(start_year: i32) -> String {
    format!("{}-{}", start_year, start_year + 1)
}

/// Human-readable form, e.g. "2024-2025 academic year, term 1".
pub fn term_display(start_year: i32, term: Term) -> String {
    format!("{} academic year, term {}", year_range(start_year), term.number())
}
