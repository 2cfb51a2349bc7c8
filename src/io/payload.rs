//! Result assembly: the transport payload handed to the presentation layer.
//!
//! Both tables are written in "split" orientation:
//!
//! ```json
//! { "columns": ["tested", ...], "index": ["2020-03-01T00:00:00Z", ...], "data": [[1.0, null, ...], ...] }
//! ```
//!
//! The index holds RFC 3339 UTC timestamps, undefined cells are `null`, and
//! numbers are written in their shortest round-trip form, so decoding gives
//! back tables equal to the ones encoded.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{NationalRow, NationalTable, RegionCatalog, RegionalRow, RegionalTable};
use crate::error::PipelineError;

pub const NATIONAL_COLUMNS: [&str; 4] = ["tested", "confirmed", "deaths", "mortality_rate"];
pub const REGIONAL_COLUMNS: [&str; 4] = ["country", "region", "confirmed", "deaths"];

/// A table in split orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitTable {
    pub columns: Vec<String>,
    pub index: Vec<String>,
    pub data: Vec<Vec<Value>>,
}

/// The assembled result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub national: SplitTable,
    pub regional: SplitTable,
    pub regions: RegionCatalog,
}

/// Tables recovered from a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTables {
    pub national: NationalTable,
    pub regional: RegionalTable,
    pub catalog: RegionCatalog,
}

/// Build the payload for a run's tables.
pub fn assemble(national: &NationalTable, regional: &RegionalTable, catalog: &RegionCatalog) -> Payload {
    Payload {
        national: encode_national(national),
        regional: encode_regional(regional),
        regions: catalog.clone(),
    }
}

impl Payload {
    pub fn to_json(&self) -> Result<String, PipelineError> {
        serde_json::to_string(self).map_err(|e| PipelineError::InvalidPayload(format!("failed to encode payload: {e}")))
    }

    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(text).map_err(|e| PipelineError::InvalidPayload(format!("failed to parse payload: {e}")))
    }

    /// Reconstruct the typed tables.
    pub fn decode(&self) -> Result<AssembledTables, PipelineError> {
        Ok(AssembledTables {
            national: decode_national(&self.national)?,
            regional: decode_regional(&self.regional)?,
            catalog: RegionCatalog::from_names(self.regions.as_slice().to_vec()),
        })
    }
}

/// Write a payload as pretty JSON.
pub fn write_payload_json(path: &Path, payload: &Payload) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(|e| PipelineError::Io {
        context: format!("failed to create payload file '{}'", path.display()),
        source: e,
    })?;
    serde_json::to_writer_pretty(file, payload)
        .map_err(|e| PipelineError::InvalidPayload(format!("failed to write payload: {e}")))?;
    Ok(())
}

/// Read a payload written by [`write_payload_json`].
pub fn read_payload_json(path: &Path) -> Result<Payload, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::Io {
        context: format!("failed to open payload file '{}'", path.display()),
        source: e,
    })?;
    serde_json::from_reader(file).map_err(|e| PipelineError::InvalidPayload(format!("failed to parse payload: {e}")))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn format_date(date: NaiveDate) -> String {
    format_timestamp(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn parse_index(raw: &str) -> Result<DateTime<Utc>, PipelineError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PipelineError::InvalidPayload(format!("invalid index timestamp '{raw}': {e}")))
}

fn number_cell(value: Option<f64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn encode_national(table: &NationalTable) -> SplitTable {
    SplitTable {
        columns: NATIONAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
        index: table.rows.iter().map(|r| format_date(r.date)).collect(),
        data: table
            .rows
            .iter()
            .map(|r| {
                vec![
                    number_cell(r.tested),
                    number_cell(r.confirmed),
                    number_cell(r.deaths),
                    number_cell(r.mortality_rate),
                ]
            })
            .collect(),
    }
}

fn encode_regional(table: &RegionalTable) -> SplitTable {
    SplitTable {
        columns: REGIONAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
        index: table.rows.iter().map(|r| format_timestamp(r.timestamp)).collect(),
        data: table
            .rows
            .iter()
            .map(|r| {
                vec![
                    Value::from(r.country.as_str()),
                    Value::from(r.region.as_str()),
                    Value::from(r.confirmed),
                    Value::from(r.deaths),
                ]
            })
            .collect(),
    }
}

fn check_shape(table: &SplitTable, expected: &[&str], name: &str) -> Result<(), PipelineError> {
    if table.columns.iter().map(String::as_str).ne(expected.iter().copied()) {
        return Err(PipelineError::InvalidPayload(format!(
            "{name} columns {:?} do not match expected {expected:?}",
            table.columns
        )));
    }
    if table.index.len() != table.data.len() {
        return Err(PipelineError::InvalidPayload(format!(
            "{name} index has {} entries but data has {} rows",
            table.index.len(),
            table.data.len()
        )));
    }
    if let Some((i, row)) = table.data.iter().enumerate().find(|(_, row)| row.len() != expected.len()) {
        return Err(PipelineError::InvalidPayload(format!(
            "{name} row {i} has {} cells, expected {}",
            row.len(),
            expected.len()
        )));
    }
    Ok(())
}

fn optional_number(value: &Value, column: &str) -> Result<Option<f64>, PipelineError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| PipelineError::InvalidPayload(format!("`{column}` value {n} is not representable"))),
        other => Err(PipelineError::InvalidPayload(format!(
            "`{column}` expected a number or null, got {other}"
        ))),
    }
}

fn required_number(value: &Value, column: &str) -> Result<f64, PipelineError> {
    optional_number(value, column)?
        .ok_or_else(|| PipelineError::InvalidPayload(format!("`{column}` must not be null")))
}

fn required_string(value: &Value, column: &str) -> Result<String, PipelineError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| PipelineError::InvalidPayload(format!("`{column}` expected a string, got {value}")))
}

fn decode_national(table: &SplitTable) -> Result<NationalTable, PipelineError> {
    check_shape(table, &NATIONAL_COLUMNS, "national")?;
    let mut rows = Vec::with_capacity(table.data.len());
    for (raw_index, cells) in table.index.iter().zip(&table.data) {
        rows.push(NationalRow {
            date: parse_index(raw_index)?.date_naive(),
            tested: optional_number(&cells[0], "tested")?,
            confirmed: optional_number(&cells[1], "confirmed")?,
            deaths: optional_number(&cells[2], "deaths")?,
            mortality_rate: optional_number(&cells[3], "mortality_rate")?,
        });
    }
    Ok(NationalTable { rows })
}

fn decode_regional(table: &SplitTable) -> Result<RegionalTable, PipelineError> {
    check_shape(table, &REGIONAL_COLUMNS, "regional")?;
    let mut rows = Vec::with_capacity(table.data.len());
    for (raw_index, cells) in table.index.iter().zip(&table.data) {
        rows.push(RegionalRow {
            timestamp: parse_index(raw_index)?,
            country: required_string(&cells[0], "country")?,
            region: required_string(&cells[1], "region")?,
            confirmed: required_number(&cells[2], "confirmed")?,
            deaths: required_number(&cells[3], "deaths")?,
        });
    }
    Ok(RegionalTable { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mortality_rate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn national_fixture() -> NationalTable {
        let row = |d: NaiveDate, tested: Option<f64>, confirmed: Option<f64>, deaths: Option<f64>| NationalRow {
            date: d,
            tested,
            confirmed,
            deaths,
            mortality_rate: mortality_rate(deaths, confirmed),
        };
        NationalTable {
            rows: vec![
                row(date(2020, 2, 29), None, Some(0.0), Some(0.0)),
                row(date(2020, 3, 1), None, Some(75.0), Some(1.0)),
                row(date(2020, 3, 4), Some(1234.0), Some(153.0), Some(11.0)),
                row(date(2020, 3, 5), Some(2001.5), None, None),
            ],
        }
    }

    fn regional_fixture() -> RegionalTable {
        let ts = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
        RegionalTable {
            rows: vec![
                RegionalRow {
                    timestamp: ts("2020-03-10T17:13:27Z"),
                    country: "US".into(),
                    region: "Georgia".into(),
                    confirmed: 17.0,
                    deaths: 0.0,
                },
                RegionalRow {
                    timestamp: ts("2020-03-22T23:45:00Z"),
                    country: "US".into(),
                    region: "Florida".into(),
                    confirmed: 1004.0,
                    deaths: 13.0,
                },
                RegionalRow {
                    timestamp: ts("2020-03-22T23:45:00.5Z"),
                    country: "US".into(),
                    region: "Georgia".into(),
                    confirmed: 0.1 + 0.2,
                    deaths: 20.0,
                },
            ],
        }
    }

    #[test]
    fn payload_round_trips_including_undefined_cells() {
        let national = national_fixture();
        let regional = regional_fixture();
        let catalog = RegionCatalog::from_table(&regional);

        let text = assemble(&national, &regional, &catalog).to_json().unwrap();
        let decoded = Payload::from_json(&text).unwrap().decode().unwrap();

        assert_eq!(decoded.national, national);
        assert_eq!(decoded.regional, regional);
        assert_eq!(decoded.catalog, catalog);
        assert!(decoded.national.rows[0].mortality_rate.is_none());
        assert!(decoded.national.rows[3].confirmed.is_none());
    }

    #[test]
    fn payload_preserves_column_order_and_iso_index() {
        let payload = assemble(&national_fixture(), &regional_fixture(), &RegionCatalog::default());
        assert_eq!(payload.national.columns, NATIONAL_COLUMNS);
        assert_eq!(payload.regional.columns, REGIONAL_COLUMNS);
        assert_eq!(payload.national.index[0], "2020-02-29T00:00:00Z");
        assert_eq!(payload.regional.index[1], "2020-03-22T23:45:00Z");
        assert_eq!(payload.national.data[0][0], Value::Null);
    }

    #[test]
    fn decode_rejects_unexpected_columns() {
        let mut payload = assemble(&national_fixture(), &regional_fixture(), &RegionCatalog::default());
        payload.national.columns.swap(0, 1);
        let err = payload.decode().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPayload(_)));
    }

    #[test]
    fn decode_rejects_null_regional_counts() {
        let mut payload = assemble(&national_fixture(), &regional_fixture(), &RegionCatalog::default());
        payload.regional.data[0][2] = Value::Null;
        assert!(payload.decode().is_err());
    }

    #[test]
    fn payload_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.json");
        let regional = regional_fixture();
        let payload = assemble(&national_fixture(), &regional, &RegionCatalog::from_table(&regional));

        write_payload_json(&path, &payload).unwrap();
        let loaded = read_payload_json(&path).unwrap();
        assert_eq!(loaded, payload);
    }
}
