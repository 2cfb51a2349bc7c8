//! CSV decoding shared by the wide time-series files and the daily snapshots.
//!
//! This module only turns text into a `RawTable` and provides the cell/header
//! parsers; deciding which columns mean what lives in `io::normalize` and
//! `aggregate::national`.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::StringRecord;

use crate::error::PipelineError;

/// A decoded CSV file: headers plus string cells, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub source_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl RawTable {
    /// Parse CSV text.
    ///
    /// Short or long rows are accepted (`flexible`); missing trailing cells read
    /// as empty. A record the CSV reader rejects outright makes the whole table
    /// unavailable.
    pub fn from_csv_str(source_name: &str, text: &str) -> Result<Self, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::unavailable(source_name, format!("failed to read CSV headers: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            // +2: records() starts after the header line, and lines are 1-based.
            let record = result.map_err(|e| {
                PipelineError::unavailable(source_name, format!("CSV parse error on line {}: {e}", idx + 2))
            })?;
            rows.push(record);
        }

        Ok(Self {
            source_name: source_name.to_string(),
            headers,
            rows,
        })
    }

    /// Lower-cased header name -> column index. The first occurrence wins.
    pub fn header_map(&self) -> HashMap<String, usize> {
        let mut map = HashMap::new();
        for (idx, name) in self.headers.iter().enumerate() {
            map.entry(normalize_header_name(name)).or_insert(idx);
        }
        map
    }

    /// Index of the first header matching any of `aliases` (already normalized).
    pub fn find_column(&self, aliases: &[&str]) -> Option<usize> {
        let map = self.header_map();
        aliases.iter().find_map(|alias| map.get(*alias).copied())
    }
}

pub fn normalize_header_name(name: &str) -> String {
    // Some exports prefix the first header with a UTF-8 BOM; without stripping it
    // the first column never matches its alias.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Trimmed cell value, `None` when empty or out of range.
pub fn get_cell(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a wide-format column header as a date (`1/22/20`, `1/22/2020`, `2020-01-22`).
pub fn parse_header_date(s: &str) -> Option<NaiveDate> {
    const FMTS: [&str; 3] = ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];
    let s = s.trim();
    FMTS.iter().find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse a snapshot "last update" cell as a UTC instant.
///
/// The daily reports changed their timestamp format several times, with and
/// without seconds, with two- and four-digit years, and date-only.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    // Two-digit years first: `%Y` would happily read `20` as the year 0020.
    const DATETIME_FMTS: [&str; 5] = [
        "%m/%d/%y %H:%M",
        "%m/%d/%Y %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    const DATE_FMTS: [&str; 3] = ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];

    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Parse a numeric cell; non-finite values are treated as missing.
pub fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
