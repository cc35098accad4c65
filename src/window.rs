use crate::table::RawTable;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An inclusive calendar range. Four of these exist per analysis run: the
/// operator-entered pre/post pair and their derived prior-year equivalents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Same month/day one year earlier, with calendar-aware clamping: a
    /// boundary on a leap day lands on Feb 28 of the non-leap year.
    pub fn shift_back_one_year(&self) -> DateRange {
        DateRange {
            start: shift_date_back_one_year(self.start),
            end: shift_date_back_one_year(self.end),
        }
    }
}

pub fn shift_date_back_one_year(date: NaiveDate) -> NaiveDate {
    let year = date.year() - 1;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .unwrap_or_else(|| clamp_to_month_end(year, date.month()))
}

fn clamp_to_month_end(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("first of month is always valid")
        .pred_opt()
        .expect("first of month always has a predecessor")
}

/// An operator-entered excluded date: either a literal `MM/DD/YYYY` string or
/// an already-parsed calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExcludedDate {
    Day(NaiveDate),
    Text(String),
}

/// Normalizes excluded-date entries to bare calendar dates. Entries that
/// cannot be parsed are dropped with a warning rather than failing the run.
pub fn normalize_excluded_dates(entries: &[ExcludedDate]) -> BTreeSet<NaiveDate> {
    let mut dates = BTreeSet::new();
    for entry in entries {
        match entry {
            ExcludedDate::Day(date) => {
                dates.insert(*date);
            }
            ExcludedDate::Text(text) => match parse_cell_date(text) {
                Some(date) => {
                    dates.insert(date);
                }
                None => warn!("Ignoring unparseable excluded date '{}'", text),
            },
        }
    }
    dates
}

const FIXED_FORMAT: &str = "%m/%d/%Y";

// Locale-free fallbacks, tried only after the fixed format rejects a value.
// Day/month-ambiguous layouts are deliberately absent.
const FALLBACK_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const FALLBACK_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Parses a transaction-date cell to a bare calendar date.
///
/// The platform's fixed `MM/DD/YYYY` format is tried first; generic parsing
/// handles only values the fixed format rejected, never the reverse, so
/// day/month-ambiguous values cannot be silently misread.
pub fn parse_cell_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, FIXED_FORMAT) {
        return Some(date);
    }

    for format in FALLBACK_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    for format in FALLBACK_DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.date());
        }
    }

    None
}

/// Returns the indices of rows whose date cell parses, falls inside `range`,
/// and is not an excluded calendar date.
///
/// An empty result is a valid outcome, not an error; downstream aggregation
/// treats it as all-zero.
pub fn filter_window(
    table: &RawTable,
    date_column: usize,
    range: DateRange,
    excluded: &BTreeSet<NaiveDate>,
) -> Vec<usize> {
    let mut kept = Vec::new();
    for (index, row) in table.rows.iter().enumerate() {
        let cell = match row.get(date_column) {
            Some(cell) => cell,
            None => continue,
        };
        let date = match parse_cell_date(cell) {
            Some(date) => date,
            None => continue,
        };
        if !range.contains(date) {
            continue;
        }
        if excluded.contains(&date) {
            continue;
        }
        kept.push(index);
    }
    kept
}
