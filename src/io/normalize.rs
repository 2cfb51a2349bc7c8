//! Schema normalization for the per-day snapshot reports.
//!
//! The daily report files were published over many months and their headers
//! drifted (`Province/State` became `Province_State`, `Last Update` became
//! `Last_Update`, casing changed). Every file is mapped onto the same five
//! canonical columns here before aggregation sees it.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::PipelineError;
use crate::io::ingest::{RawTable, get_cell, parse_opt_f64, parse_timestamp};

pub const TIMESTAMP_ALIASES: &[&str] = &["last update", "last_update"];
pub const COUNTRY_ALIASES: &[&str] = &["country/region", "country_region", "country"];
pub const REGION_ALIASES: &[&str] = &["province/state", "province_state", "state"];
pub const CONFIRMED_ALIASES: &[&str] = &["confirmed"];
pub const DEATHS_ALIASES: &[&str] = &["deaths"];

/// A snapshot row in the canonical schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    /// Timestamp exactly as written in the file; aggregation groups on this.
    pub timestamp_text: String,
    pub timestamp: DateTime<Utc>,
    pub country: String,
    pub region: String,
    pub confirmed: f64,
    pub deaths: f64,
}

/// Result of normalizing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSnapshot {
    pub source_name: String,
    pub rows: Vec<SnapshotRow>,
    /// Rows dropped because their timestamp could not be parsed.
    pub rows_dropped: usize,
    /// Rows dropped because their country or region cell was empty.
    pub rows_unlocated: usize,
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    timestamp: usize,
    country: usize,
    region: usize,
    confirmed: usize,
    deaths: usize,
}

/// Maps raw snapshot tables onto the canonical schema.
#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    target_country: String,
}

impl SchemaNormalizer {
    /// `target_country` is the canonical spelling any case-variant is folded to.
    pub fn new(target_country: impl Into<String>) -> Self {
        Self {
            target_country: target_country.into(),
        }
    }

    /// Normalize one raw snapshot.
    ///
    /// Rows with an unparsable timestamp, or an empty country or region, are
    /// dropped and counted.
    ///
    /// Fails with [`PipelineError::UnrecognizedSchema`] when any of the five
    /// required columns has no recognised header; callers skip that file.
    pub fn normalize(&self, table: &RawTable) -> Result<NormalizedSnapshot, PipelineError> {
        let cols = resolve_columns(table)?;

        let mut rows = Vec::with_capacity(table.rows.len());
        let mut rows_dropped = 0usize;
        let mut rows_unlocated = 0usize;

        for record in &table.rows {
            let Some(timestamp_text) = get_cell(record, cols.timestamp) else {
                rows_dropped += 1;
                continue;
            };
            let Some(timestamp) = parse_timestamp(timestamp_text) else {
                rows_dropped += 1;
                continue;
            };

            // Country-level rows carry no region and are not part of any region's series.
            let (Some(country), Some(region)) = (get_cell(record, cols.country), get_cell(record, cols.region)) else {
                rows_unlocated += 1;
                continue;
            };

            rows.push(SnapshotRow {
                timestamp_text: timestamp_text.to_string(),
                timestamp,
                country: self.canonical_country(country),
                region: region.to_string(),
                // Empty counts sum as zero, same as the source data's own totals.
                confirmed: parse_opt_f64(get_cell(record, cols.confirmed)).unwrap_or(0.0),
                deaths: parse_opt_f64(get_cell(record, cols.deaths)).unwrap_or(0.0),
            });
        }

        if rows_dropped > 0 {
            debug!(
                source = %table.source_name,
                rows_dropped,
                "dropped snapshot rows with unparsable timestamps"
            );
        }
        if rows_unlocated > 0 {
            debug!(
                source = %table.source_name,
                rows_unlocated,
                "dropped snapshot rows without country or region"
            );
        }

        Ok(NormalizedSnapshot {
            source_name: table.source_name.clone(),
            rows,
            rows_dropped,
            rows_unlocated,
        })
    }

    fn canonical_country(&self, raw: &str) -> String {
        if raw.eq_ignore_ascii_case(&self.target_country) {
            self.target_country.clone()
        } else {
            raw.to_string()
        }
    }
}

fn resolve_columns(table: &RawTable) -> Result<ColumnIndex, PipelineError> {
    let require = |label: &str, aliases: &[&str]| -> Result<usize, PipelineError> {
        table.find_column(aliases).ok_or_else(|| {
            PipelineError::schema(
                &table.source_name,
                format!("no `{label}` column (expected one of: {})", aliases.join(", ")),
            )
        })
    };

    Ok(ColumnIndex {
        timestamp: require("timestamp", TIMESTAMP_ALIASES)?,
        country: require("country", COUNTRY_ALIASES)?,
        region: require("region", REGION_ALIASES)?,
        confirmed: require("confirmed", CONFIRMED_ALIASES)?,
        deaths: require("deaths", DEATHS_ALIASES)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> RawTable {
        RawTable::from_csv_str("03-22-2020.csv", text).unwrap()
    }

    #[test]
    fn maps_underscore_headers_to_canonical_columns() {
        let raw = table(
            "FIPS,Admin2,Province_State,Country_Region,Last_Update,Lat,Long_,Confirmed,Deaths,Recovered\n\
             ,,Georgia,US,2020-03-22 23:45:00,33.0,-83.6,600,20,0\n",
        );
        let out = SchemaNormalizer::new("US").normalize(&raw).unwrap();
        assert_eq!(out.rows.len(), 1);
        let row = &out.rows[0];
        assert_eq!(row.region, "Georgia");
        assert_eq!(row.country, "US");
        assert_eq!(row.confirmed, 600.0);
        assert_eq!(row.deaths, 20.0);
        assert_eq!(row.timestamp_text, "2020-03-22 23:45:00");
    }

    #[test]
    fn maps_slash_headers_in_any_case() {
        let raw = table(
            "PROVINCE/STATE,country/region,Last Update,CONFIRMED,deaths\n\
             Hubei,Mainland China,1/22/2020 17:00,444,17\n",
        );
        let out = SchemaNormalizer::new("US").normalize(&raw).unwrap();
        assert_eq!(out.rows[0].region, "Hubei");
        assert_eq!(out.rows[0].country, "Mainland China");
    }

    #[test]
    fn folds_country_casing_onto_target() {
        let raw = table("Province/State,Country/Region,Last Update,Confirmed,Deaths\nGeorgia,us,3/10/20 12:00,5,0\n");
        let out = SchemaNormalizer::new("US").normalize(&raw).unwrap();
        assert_eq!(out.rows[0].country, "US");
    }

    #[test]
    fn empty_counts_read_as_zero() {
        let raw = table("Province/State,Country/Region,Last Update,Confirmed,Deaths\nGeorgia,US,3/10/20 12:00,,\n");
        let out = SchemaNormalizer::new("US").normalize(&raw).unwrap();
        assert_eq!(out.rows[0].confirmed, 0.0);
        assert_eq!(out.rows[0].deaths, 0.0);
    }

    #[test]
    fn rows_with_bad_timestamps_are_dropped() {
        let raw = table(
            "Province/State,Country/Region,Last Update,Confirmed,Deaths\n\
             Georgia,US,not a date,5,0\n\
             Florida,US,3/10/20 12:00,7,1\n",
        );
        let out = SchemaNormalizer::new("US").normalize(&raw).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows_dropped, 1);
        assert_eq!(out.rows[0].region, "Florida");
    }

    #[test]
    fn rows_without_region_or_country_are_dropped() {
        let raw = table(
            "Province/State,Country/Region,Last Update,Confirmed,Deaths\n\
             ,US,2020-03-01T23:53:03,30,1\n\
             Washington,,2020-03-01T23:53:03,2,0\n\
             Washington,US,2020-03-01T23:53:03,18,1\n",
        );
        let out = SchemaNormalizer::new("US").normalize(&raw).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].region, "Washington");
        assert_eq!(out.rows_unlocated, 2);
        assert_eq!(out.rows_dropped, 0);
    }

    #[test]
    fn missing_region_column_is_unrecognized_schema() {
        let raw = table("Area,Country/Region,Last Update,Confirmed,Deaths\nGeorgia,US,3/10/20 12:00,5,0\n");
        let err = SchemaNormalizer::new("US").normalize(&raw).unwrap_err();
        assert!(matches!(err, PipelineError::UnrecognizedSchema { .. }));
        assert!(err.to_string().contains("region"));
    }
}
