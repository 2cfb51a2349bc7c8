//! National testing feed: live fetch with fallback to the on-disk cache.
//!
//! This feed is the only one allowed to fail outright. When neither the live
//! endpoint nor the cache produces data, the national table simply has no
//! `tested` values.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::data::cache::TestingCache;
use crate::data::fetch::{Fetcher, parse_json_array};
use crate::domain::{SourceDescriptor, TimeSeries};
use crate::error::PipelineError;

/// Record fields tried, in order, for the cumulative tested count.
const TESTED_FIELDS: [&str; 2] = ["total", "totalTestResults"];

/// Where the testing series of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestingOrigin {
    Live,
    Cache,
    Unavailable,
}

impl TestingOrigin {
    pub fn label(self) -> &'static str {
        match self {
            TestingOrigin::Live => "live",
            TestingOrigin::Cache => "cache",
            TestingOrigin::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestingFeed {
    /// `None` when no source produced data.
    pub series: Option<TimeSeries>,
    pub origin: TestingOrigin,
}

/// Fetch the testing series, refreshing the cache on success and reading it on failure.
///
/// Never fails: every error degrades to [`TestingOrigin::Cache`] or
/// [`TestingOrigin::Unavailable`].
pub fn load_testing_feed(fetcher: &Fetcher<'_>, desc: &SourceDescriptor, cache: &TestingCache) -> TestingFeed {
    match fetcher.fetch(desc).and_then(|p| p.into_records(&desc.name)) {
        Ok(records) => {
            // Only a body that decoded cleanly replaces the cache.
            match serde_json::to_string(&records) {
                Ok(body) => {
                    if let Err(e) = cache.store(&body) {
                        warn!(error = %e, "failed to refresh testing cache");
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize testing records for cache"),
            }
            let series = parse_testing_records(&records);
            info!(source = %desc.name, dates = series.len(), "loaded testing feed");
            TestingFeed {
                series: Some(series),
                origin: TestingOrigin::Live,
            }
        }
        Err(fetch_err) => {
            warn!(source = %desc.name, error = %fetch_err, "testing feed unavailable, trying cache");
            match load_from_cache(&desc.name, cache) {
                Ok(series) => {
                    info!(path = %cache.path().display(), dates = series.len(), "loaded testing feed from cache");
                    TestingFeed {
                        series: Some(series),
                        origin: TestingOrigin::Cache,
                    }
                }
                Err(cache_err) => {
                    warn!(error = %cache_err, "no testing data; `tested` will be empty");
                    TestingFeed {
                        series: None,
                        origin: TestingOrigin::Unavailable,
                    }
                }
            }
        }
    }
}

fn load_from_cache(source_name: &str, cache: &TestingCache) -> Result<TimeSeries, PipelineError> {
    let body = cache.load()?;
    let records = parse_json_array(source_name, &body)?;
    Ok(parse_testing_records(&records))
}

/// Turn testing-feed records into a date -> tested series.
///
/// Records without a usable date or tested value are skipped; on duplicate
/// dates the first record wins.
pub fn parse_testing_records(records: &[Value]) -> TimeSeries {
    let mut series = TimeSeries::new();
    let mut skipped = 0usize;
    for record in records {
        let Some(date) = record.get("date").and_then(parse_record_date) else {
            skipped += 1;
            continue;
        };
        let Some(tested) = TESTED_FIELDS
            .iter()
            .find_map(|field| record.get(*field).and_then(Value::as_f64))
        else {
            skipped += 1;
            continue;
        };
        if !series.insert_first(date, tested) {
            debug!(%date, "duplicate testing record ignored");
        }
    }
    if skipped > 0 {
        debug!(skipped, "skipped testing records without date or total");
    }
    series
}

/// Dates arrive as `20200304`, either as a number or a string.
fn parse_record_date(value: &Value) -> Option<NaiveDate> {
    let raw = match value {
        Value::Number(n) => n.as_u64()?.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    NaiveDate::parse_from_str(&raw, "%Y%m%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn records_parse_numeric_and_string_dates() {
        let records = vec![
            json!({"date": 20200305, "total": 2500}),
            json!({"date": "20200304", "total": 1200}),
            json!({"date": 20200303, "total": null, "totalTestResults": 900}),
            json!({"date": 20200302}),
            json!({"date": "March 1", "total": 10}),
        ];
        let series = parse_testing_records(&records);
        assert_eq!(series.len(), 3);
        assert_eq!(series.get(d(2020, 3, 5)), Some(2500.0));
        assert_eq!(series.get(d(2020, 3, 4)), Some(1200.0));
        assert_eq!(series.get(d(2020, 3, 3)), Some(900.0));
    }

    #[test]
    fn duplicate_dates_keep_first_record() {
        let records = vec![
            json!({"date": 20200305, "total": 2500}),
            json!({"date": 20200305, "total": 1}),
        ];
        let series = parse_testing_records(&records);
        assert_eq!(series.get(d(2020, 3, 5)), Some(2500.0));
    }
}
