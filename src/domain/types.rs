//! Shared domain types.
//!
//! These types are intentionally plain values: the pipeline builds them from
//! scratch on every run and hands them to consumers by reference.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const CONFIRMED_GLOBAL_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";
const DEATHS_GLOBAL_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_global.csv";
const TESTING_DAILY_URL: &str = "https://covidtracking.com/api/us/daily";
const DAILY_REPORTS_URL: &str =
    "https://api.github.com/repos/CSSEGISandData/COVID-19/contents/csse_covid_19_data/csse_covid_19_daily_reports";

/// Date-indexed series with at most one value per date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: BTreeMap<NaiveDate, f64>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, keeping the existing one if the date is already present.
    ///
    /// Returns `false` when the date was a duplicate.
    pub fn insert_first(&mut self, date: NaiveDate, value: f64) -> bool {
        if self.points.contains_key(&date) {
            return false;
        }
        self.points.insert(date, value);
        true
    }

    /// Add `value` to the running total for `date`.
    pub fn accumulate(&mut self, date: NaiveDate, value: f64) {
        *self.points.entry(date).or_insert(0.0) += value;
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points.get(&date).copied()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().map(|(d, v)| (*d, *v))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<(NaiveDate, f64)> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        let mut series = TimeSeries::new();
        for (date, value) in iter {
            series.insert_first(date, value);
        }
        series
    }
}

/// `deaths / confirmed`, or `None` when the ratio is undefined.
///
/// `None` covers a missing numerator/denominator and a zero (or negative)
/// confirmed count; the result is never `NaN` or infinite.
pub fn mortality_rate(deaths: Option<f64>, confirmed: Option<f64>) -> Option<f64> {
    let deaths = deaths?;
    let confirmed = confirmed?;
    if confirmed > 0.0 {
        Some(deaths / confirmed)
    } else {
        None
    }
}

/// One row of the national summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct NationalRow {
    pub date: NaiveDate,
    pub tested: Option<f64>,
    pub confirmed: Option<f64>,
    pub deaths: Option<f64>,
    pub mortality_rate: Option<f64>,
}

/// National summary table: one row per date, ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NationalTable {
    pub rows: Vec<NationalRow>,
}

impl NationalTable {
    pub fn latest(&self) -> Option<&NationalRow> {
        self.rows.last()
    }

    /// True when no row carries a tested value.
    pub fn tested_is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.tested.is_none())
    }
}

/// One row of the per-region table.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionalRow {
    pub timestamp: DateTime<Utc>,
    pub country: String,
    pub region: String,
    pub confirmed: f64,
    pub deaths: f64,
}

/// Per-region table, sorted ascending by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionalTable {
    pub rows: Vec<RegionalRow>,
}

/// Sorted, distinct region names of a regional table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionCatalog {
    regions: Vec<String>,
}

impl RegionCatalog {
    pub fn from_table(table: &RegionalTable) -> Self {
        let mut regions: Vec<String> = table.rows.iter().map(|r| r.region.clone()).collect();
        regions.sort();
        regions.dedup();
        Self { regions }
    }

    pub fn from_names(mut regions: Vec<String>) -> Self {
        regions.sort();
        regions.dedup();
        Self { regions }
    }

    pub fn contains(&self, region: &str) -> bool {
        self.regions.binary_search_by(|r| r.as_str().cmp(region)).is_ok()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// One entry of a single region's series.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPoint {
    pub timestamp: DateTime<Utc>,
    pub confirmed: f64,
    pub deaths: f64,
    pub mortality_rate: Option<f64>,
}

/// How finely a region's series is collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesGranularity {
    /// One point per distinct update instant (last one wins).
    Update,
    /// One point per calendar date: the latest update of that day.
    Daily,
}

/// Expected shape of a remote payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceShape {
    /// Header row plus records: the wide series and the daily snapshots.
    Csv,
    JsonArray,
    DirectoryListing,
}

/// A named remote source and the shape its body must decode as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub name: String,
    pub url: String,
    pub shape: SourceShape,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>, shape: SourceShape) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            shape,
        }
    }
}

/// Remote endpoints for every feed the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrls {
    pub confirmed: String,
    pub deaths: String,
    pub testing: String,
    pub daily_reports: String,
}

impl Default for SourceUrls {
    fn default() -> Self {
        Self {
            confirmed: CONFIRMED_GLOBAL_URL.to_string(),
            deaths: DEATHS_GLOBAL_URL.to_string(),
            testing: TESTING_DAILY_URL.to_string(),
            daily_reports: DAILY_REPORTS_URL.to_string(),
        }
    }
}

impl SourceUrls {
    /// Point every feed at `base` (used with mock servers).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            confirmed: format!("{base}/time_series_covid19_confirmed_global.csv"),
            deaths: format!("{base}/time_series_covid19_deaths_global.csv"),
            testing: format!("{base}/api/us/daily"),
            daily_reports: format!("{base}/daily_reports"),
        }
    }

    pub fn confirmed_source(&self) -> SourceDescriptor {
        SourceDescriptor::new("confirmed", &self.confirmed, SourceShape::Csv)
    }

    pub fn deaths_source(&self) -> SourceDescriptor {
        SourceDescriptor::new("deaths", &self.deaths, SourceShape::Csv)
    }

    pub fn testing_source(&self) -> SourceDescriptor {
        SourceDescriptor::new("testing", &self.testing, SourceShape::JsonArray)
    }

    pub fn listing_source(&self) -> SourceDescriptor {
        SourceDescriptor::new("daily_reports", &self.daily_reports, SourceShape::DirectoryListing)
    }
}

/// Why a pseudo-region is dropped from the regional table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusionReason {
    /// County/city granularity, e.g. `"King County, WA"`.
    SubRegion,
    CruiseShip,
    OverseasCity,
    RecoveredBucket,
    NationalAggregate,
    CruiseTerminal,
}

/// A case-sensitive substring that marks a region as not a real region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRule {
    pub pattern: String,
    pub reason: ExclusionReason,
}

impl ExclusionRule {
    pub fn new(pattern: impl Into<String>, reason: ExclusionReason) -> Self {
        Self {
            pattern: pattern.into(),
            reason,
        }
    }

    pub fn matches(&self, region: &str) -> bool {
        region.contains(self.pattern.as_str())
    }

    pub fn defaults() -> Vec<ExclusionRule> {
        vec![
            ExclusionRule::new(",", ExclusionReason::SubRegion),
            ExclusionRule::new("Diamond", ExclusionReason::CruiseShip),
            ExclusionRule::new("Wuhan", ExclusionReason::OverseasCity),
            ExclusionRule::new("Recovered", ExclusionReason::RecoveredBucket),
            ExclusionRule::new("US", ExclusionReason::NationalAggregate),
            ExclusionRule::new("Grand", ExclusionReason::CruiseTerminal),
        ]
    }
}

/// Everything a pipeline run needs to know.
///
/// Built by the binary from flags and environment; the library never reads
/// either on its own.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub target_country: String,
    pub urls: SourceUrls,
    /// Where the last good testing-feed response is kept.
    pub cache_path: PathBuf,
    pub timeout: Duration,
    pub exclusions: Vec<ExclusionRule>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_country: "US".to_string(),
            urls: SourceUrls::default(),
            cache_path: PathBuf::from("testing_us.json"),
            timeout: Duration::from_secs(30),
            exclusions: ExclusionRule::defaults(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn mortality_rate_is_undefined_for_zero_confirmed() {
        assert_eq!(mortality_rate(Some(3.0), Some(0.0)), None);
        assert_eq!(mortality_rate(Some(0.0), Some(0.0)), None);
        assert_eq!(mortality_rate(None, Some(10.0)), None);
        assert_eq!(mortality_rate(Some(1.0), None), None);
        assert_eq!(mortality_rate(Some(1.0), Some(4.0)), Some(0.25));
    }

    #[test]
    fn time_series_keeps_first_value_per_date() {
        let mut s = TimeSeries::new();
        assert!(s.insert_first(d(2020, 3, 1), 1.0));
        assert!(!s.insert_first(d(2020, 3, 1), 2.0));
        assert_eq!(s.get(d(2020, 3, 1)), Some(1.0));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn catalog_is_sorted_and_distinct() {
        let ts = DateTime::parse_from_rfc3339("2020-03-22T23:45:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let row = |region: &str| RegionalRow {
            timestamp: ts,
            country: "US".into(),
            region: region.into(),
            confirmed: 1.0,
            deaths: 0.0,
        };
        let table = RegionalTable {
            rows: vec![row("Texas"), row("Alabama"), row("Texas"), row("Georgia")],
        };
        let catalog = RegionCatalog::from_table(&table);
        assert_eq!(catalog.as_slice(), ["Alabama", "Georgia", "Texas"]);
        assert!(catalog.contains("Georgia"));
        assert!(!catalog.contains("Ohio"));
    }

    #[test]
    fn default_exclusions_cover_known_pseudo_regions() {
        let rules = ExclusionRule::defaults();
        let excluded = |name: &str| rules.iter().any(|r| r.matches(name));
        assert!(excluded("Diamond Princess"));
        assert!(excluded("King County, WA"));
        assert!(excluded("Grand Princess"));
        assert!(excluded("Recovered"));
        assert!(excluded("Wuhan Evacuee"));
        assert!(excluded("US"));
        assert!(!excluded("Georgia"));
    }
}
