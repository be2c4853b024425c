//! Column mapping and value normalization.
//!
//! Renames source headers to storage columns per the report descriptor and
//! cleans values on the way through: blank/NaN/NaT-like cells become null,
//! and timestamp columns are coerced from whatever textual or native
//! representation the export produced, with unparseable values nulled
//! rather than failing the row. The input sheet is never mutated.

use std::collections::HashMap;

use chrono::{Days, Duration, NaiveDate, NaiveDateTime};
use log::debug;

use crate::report::{Column, ColumnKind, ReportDescriptor};
use crate::sheet::{Cell, Sheet};

/// A normalized storage value ready to bind to a write.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Timestamp(NaiveDateTime),
    Null,
}

/// One normalized row keyed by storage column name. Columns absent from
/// the source are absent here too; the upsert engine binds them as null.
pub type Record = HashMap<&'static str, Field>;

/// Maps and normalizes every row of `sheet` for the given report type.
///
/// Source headers are matched case-insensitively after trimming, which
/// tolerates the stray whitespace some exports carry.
pub fn map_and_normalize(sheet: &Sheet, descriptor: &ReportDescriptor) -> Vec<Record> {
    let mapped: Vec<(usize, &Column)> = sheet
        .headers
        .iter()
        .enumerate()
        .filter_map(|(idx, header)| {
            descriptor
                .columns
                .iter()
                .find(|col| col.source.eq_ignore_ascii_case(header.trim()))
                .map(|col| (idx, col))
        })
        .collect();
    debug!(
        "mapped {} of {} source column(s) for table '{}'",
        mapped.len(),
        sheet.headers.len(),
        descriptor.table
    );

    sheet
        .rows
        .iter()
        .map(|row| {
            mapped
                .iter()
                .map(|(idx, col)| {
                    let cell = row.get(*idx).unwrap_or(&Cell::Empty);
                    (col.name, normalize_cell(cell, col.kind))
                })
                .collect()
        })
        .collect()
}

fn normalize_cell(cell: &Cell, kind: ColumnKind) -> Field {
    match cell {
        Cell::Empty => Field::Null,
        Cell::Text(raw) => normalize_text(raw, kind),
        Cell::Number(n) => {
            if n.is_nan() {
                Field::Null
            } else {
                match kind {
                    // An unformatted workbook cell can still hold a raw
                    // Excel date serial.
                    ColumnKind::Timestamp => match from_excel_serial(*n) {
                        Some(ts) => Field::Timestamp(ts),
                        None => {
                            debug!("nulling numeric value {n} in a timestamp column");
                            Field::Null
                        }
                    },
                    ColumnKind::Text => Field::Text(format_number(*n)),
                }
            }
        }
        Cell::Bool(b) => Field::Text(b.to_string()),
        Cell::DateTime(dt) => match kind {
            ColumnKind::Timestamp => Field::Timestamp(*dt),
            ColumnKind::Text => Field::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        },
    }
}

fn normalize_text(raw: &str, kind: ColumnKind) -> Field {
    let trimmed = raw.trim();
    if is_null_like(trimmed) {
        return Field::Null;
    }
    match kind {
        ColumnKind::Text => Field::Text(trimmed.to_string()),
        ColumnKind::Timestamp => match parse_timestamp(trimmed) {
            Some(ts) => Field::Timestamp(ts),
            None => Field::Null,
        },
    }
}

/// Blank, NaN, and pandas' NaT marker (any case) all read as null.
fn is_null_like(value: &str) -> bool {
    value.is_empty()
        || value.eq_ignore_ascii_case("nan")
        || value.eq_ignore_ascii_case("nat")
        || value.eq_ignore_ascii_case("none")
        || value.eq_ignore_ascii_case("null")
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

/// Interprets a number as an Excel 1900-system date serial, day fraction
/// as time of day. Serial 2958465 is 9999-12-31, the last date Excel can
/// represent; values outside the range are not dates. Uses the usual
/// 1899-12-30 epoch, so serials before 1900-03-01 inherit Excel's
/// phantom-leap-day offset.
fn from_excel_serial(value: f64) -> Option<NaiveDateTime> {
    if !(1.0..=2_958_465.0).contains(&value) {
        return None;
    }
    let seconds = (value.fract() * 86_400.0).round() as i64;
    NaiveDate::from_ymd_opt(1899, 12, 30)?
        .checked_add_days(Days::new(value.trunc() as u64))?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::seconds(seconds))
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// Best-effort timestamp parse across the formats seen in real exports.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(parsed);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}
