//! Cleaner stage: drops rows without usable `sales` and `date` values.
//!
//! Coercion never fails loudly. A value that cannot be parsed turns into a
//! null and its row is dropped in the final filter pass.

use crate::table::{RawRecord, SalesRecord, Table};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{info, instrument};

static YEAR_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}[-/.]").expect("valid year prefix regex"));

static COMPACT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("valid compact date regex"));

static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})([/-])(\d{1,2})([/-])(\d{4})$").expect("valid day/month/year regex")
});

/// Four-digit years only; chrono happily reads "24" or "0000" as a year
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1000..=9999;

const YEAR_FIRST_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

// %B accepts both full and abbreviated month names when parsing
const TEXTUAL_FORMATS: &[&str] = &["%B %d %Y", "%B %d, %Y", "%d %B %Y", "%d %B, %Y", "%d-%B-%Y"];

/// Coerce a raw `sales` value to a number. Surrounding whitespace is ignored.
pub fn parse_sales(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

/// Tolerant calendar-date parser.
///
/// Returns `None` for anything impossible (`2024-02-30`), ambiguous
/// (`01/02/2024`) or without a four-digit year (`Jan 5 24`); the time part of
/// a timestamp is discarded.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_any_date(raw.trim()).filter(|d| YEAR_RANGE.contains(&d.year()))
}

fn parse_any_date(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }

    // chrono's %Y takes any digit count, so "1/5/24" would otherwise be year 1
    let year_first = YEAR_PREFIX.is_match(s);

    if year_first {
        for fmt in YEAR_FIRST_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return Some(d);
            }
        }
    }

    if let Some(caps) = COMPACT_DATE.captures(s) {
        let (y, m, d) = (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local().date());
    }

    if year_first {
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(dt.date());
            }
        }
    }

    for fmt in TEXTUAL_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    parse_day_month_year(s)
}

/// `dd/mm/yyyy` or `mm/dd/yyyy`, accepted only when the reading is unique
fn parse_day_month_year(s: &str) -> Option<NaiveDate> {
    let caps = DAY_MONTH_YEAR.captures(s)?;
    if caps[2] != caps[4] {
        return None;
    }
    let first: u32 = caps[1].parse().ok()?;
    let second: u32 = caps[3].parse().ok()?;
    let year: i32 = caps[5].parse().ok()?;

    let (month, day) = match (first <= 12, second <= 12) {
        (true, true) if first == second => (first, second),
        (true, false) => (first, second),
        (false, true) => (second, first),
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Cleaned table plus how many rows each filter pass removed
#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub table: Table<SalesRecord>,
    /// Rows whose `sales` or `date` was absent in the input
    pub dropped_missing: usize,
    /// Rows whose `sales` or `date` could not be coerced
    pub dropped_invalid: usize,
}

impl CleanReport {
    pub fn dropped(&self) -> usize {
        self.dropped_missing + self.dropped_invalid
    }
}

struct CoercedRecord {
    sales: Option<f64>,
    date: Option<NaiveDate>,
    category: Option<String>,
    extra: Vec<Option<String>>,
}

impl CoercedRecord {
    fn from_raw(raw: RawRecord) -> Self {
        Self {
            sales: raw.sales.as_deref().and_then(parse_sales),
            date: raw.date.as_deref().and_then(parse_date),
            category: raw.category,
            extra: raw.extra,
        }
    }

    fn into_valid(self) -> Option<SalesRecord> {
        Some(SalesRecord {
            sales: self.sales?,
            date: self.date?,
            category: self.category.unwrap_or_default(),
            extra: self.extra,
        })
    }
}

/// Validate and normalize a table. Never fails; bad rows are dropped.
#[instrument(skip(table), fields(rows = table.len()))]
pub fn clean_table(table: Table<RawRecord>) -> CleanReport {
    let (columns, rows) = table.into_parts();
    let total = rows.len();

    // Pass 1: drop rows with absent required fields
    let present: Vec<RawRecord> = rows
        .into_iter()
        .filter(|r| r.sales.is_some() && r.date.is_some())
        .collect();
    let dropped_missing = total - present.len();

    // Pass 2: coerce sales and date, failures become null
    let coerced: Vec<CoercedRecord> = present.into_iter().map(CoercedRecord::from_raw).collect();
    let after_coercion = coerced.len();

    // Pass 3: drop rows coercion nulled out
    let cleaned: Vec<SalesRecord> = coerced
        .into_iter()
        .filter_map(CoercedRecord::into_valid)
        .collect();
    let dropped_invalid = after_coercion - cleaned.len();

    counter!("sales_etl_rows_dropped_total", "reason" => "missing").increment(dropped_missing as u64);
    counter!("sales_etl_rows_dropped_total", "reason" => "invalid").increment(dropped_invalid as u64);
    info!(
        "Cleaned {} rows: kept {}, dropped {} missing and {} invalid",
        total,
        cleaned.len(),
        dropped_missing,
        dropped_invalid
    );

    CleanReport {
        table: Table::new(columns, cleaned),
        dropped_missing,
        dropped_invalid,
    }
}

/// Cleaned table only
pub fn clean(table: Table<RawRecord>) -> Table<SalesRecord> {
    clean_table(table).table
}
