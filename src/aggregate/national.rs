//! National aggregation: wide global series -> one national series -> summary table.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::{NationalRow, NationalTable, TimeSeries, mortality_rate};
use crate::error::PipelineError;
use crate::io::ingest::{RawTable, get_cell, parse_header_date, parse_opt_f64};
use crate::io::normalize::COUNTRY_ALIASES;

/// Collapse a wide time-series table into one series for `target_country`.
///
/// Every row whose country matches (case-insensitively) contributes; columns
/// whose header is not a date (province, lat/long, ...) are ignored. Each date
/// column yields an entry even when no row has a value for it, matching a
/// column-wise sum over the matching rows.
pub fn collapse_wide_series(table: &RawTable, target_country: &str) -> Result<TimeSeries, PipelineError> {
    let country_idx = table.find_column(COUNTRY_ALIASES).ok_or_else(|| {
        PipelineError::schema(
            &table.source_name,
            format!("no country column (expected one of: {})", COUNTRY_ALIASES.join(", ")),
        )
    })?;

    let date_columns: Vec<(usize, NaiveDate)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != country_idx)
        .filter_map(|(idx, header)| parse_header_date(header).map(|d| (idx, d)))
        .collect();

    if date_columns.is_empty() {
        return Err(PipelineError::schema(&table.source_name, "no date columns"));
    }

    let mut series = TimeSeries::new();
    for (_, date) in &date_columns {
        series.accumulate(*date, 0.0);
    }

    let mut matched = 0usize;
    for record in &table.rows {
        let country = get_cell(record, country_idx).unwrap_or_default();
        if !country.eq_ignore_ascii_case(target_country) {
            continue;
        }
        matched += 1;
        for (idx, date) in &date_columns {
            if let Some(value) = parse_opt_f64(get_cell(record, *idx)) {
                series.accumulate(*date, value);
            }
        }
    }

    if matched == 0 {
        warn!(source = %table.source_name, country = target_country, "no rows for target country");
    } else {
        debug!(source = %table.source_name, rows = matched, dates = series.len(), "collapsed wide series");
    }

    Ok(series)
}

/// Outer-join the three national series on date and derive the mortality rate.
///
/// `tested` is `None` when the testing feed produced nothing at all; every row's
/// `tested` is then undefined.
pub fn merge_national(tested: Option<&TimeSeries>, confirmed: &TimeSeries, deaths: &TimeSeries) -> NationalTable {
    let mut dates: BTreeSet<NaiveDate> = confirmed.dates().collect();
    dates.extend(deaths.dates());
    if let Some(tested) = tested {
        dates.extend(tested.dates());
    }

    let rows = dates
        .into_iter()
        .map(|date| {
            let confirmed = confirmed.get(date);
            let deaths = deaths.get(date);
            NationalRow {
                date,
                tested: tested.and_then(|t| t.get(date)),
                confirmed,
                deaths,
                mortality_rate: mortality_rate(deaths, confirmed),
            }
        })
        .collect();

    NationalTable { rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIRMED_CSV: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,Afghanistan,33.0,65.0,0,0,1
Diamond Princess,US,0,0,0,1,2
,US,37.1,-95.7,1,1,
,us,37.1,-95.7,0,2,3
";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn sums_all_subdivision_rows_per_date() {
        let table = RawTable::from_csv_str("confirmed", CONFIRMED_CSV).unwrap();
        let series = collapse_wide_series(&table, "US").unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.get(d(2020, 1, 22)), Some(1.0));
        assert_eq!(series.get(d(2020, 1, 23)), Some(4.0));
        // Empty cell contributes nothing.
        assert_eq!(series.get(d(2020, 1, 24)), Some(5.0));
    }

    #[test]
    fn missing_country_column_is_schema_error() {
        let table = RawTable::from_csv_str("deaths", "Lat,Long,1/22/20\n1,2,3\n").unwrap();
        let err = collapse_wide_series(&table, "US").unwrap_err();
        assert!(matches!(err, PipelineError::UnrecognizedSchema { .. }));
    }

    #[test]
    fn unknown_country_yields_zero_series() {
        let table = RawTable::from_csv_str("confirmed", CONFIRMED_CSV).unwrap();
        let series = collapse_wide_series(&table, "Atlantis").unwrap();
        assert!(series.iter().all(|(_, v)| v == 0.0));
    }

    #[test]
    fn merge_is_an_outer_join_sorted_by_date() {
        let confirmed: TimeSeries = [(d(2020, 3, 1), 0.0), (d(2020, 3, 2), 100.0)].into_iter().collect();
        let deaths: TimeSeries = [(d(2020, 3, 1), 0.0), (d(2020, 3, 2), 3.0)].into_iter().collect();
        let tested: TimeSeries = [(d(2020, 3, 3), 500.0), (d(2020, 3, 2), 400.0)].into_iter().collect();

        let table = merge_national(Some(&tested), &confirmed, &deaths);
        let dates: Vec<_> = table.rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(2020, 3, 1), d(2020, 3, 2), d(2020, 3, 3)]);

        assert_eq!(table.rows[0].tested, None);
        assert_eq!(table.rows[0].mortality_rate, None);
        assert_eq!(table.rows[1].mortality_rate, Some(3.0 / 100.0));
        assert_eq!(table.rows[2].confirmed, None);
        assert_eq!(table.rows[2].tested, Some(500.0));
        assert_eq!(table.rows[2].mortality_rate, None);
    }

    #[test]
    fn mortality_rate_matches_ratio_exactly_when_confirmed_positive() {
        let confirmed: TimeSeries = (1..=20).map(|i| (d(2020, 3, i), f64::from(i % 4) * 37.0)).collect();
        let deaths: TimeSeries = (1..=20).map(|i| (d(2020, 3, i), f64::from(i) * 1.3)).collect();
        let table = merge_national(None, &confirmed, &deaths);
        for row in &table.rows {
            let (c, dth) = (row.confirmed.unwrap(), row.deaths.unwrap());
            if c > 0.0 {
                assert_eq!(row.mortality_rate, Some(dth / c));
            } else {
                assert_eq!(row.mortality_rate, None);
            }
        }
        assert!(table.tested_is_empty());
    }
}
