//! Regional aggregation over the normalized daily snapshots.
//!
//! Order of operations matters and mirrors how the published files overlap:
//!
//! 1. group on (timestamp text, country, region) and sum, which merges report
//!    corrections published with the identical timestamp
//! 2. keep the target country
//! 3. drop pseudo-regions (cruise ships, county-level rows, aggregates)
//! 4. sort by parsed timestamp
//! 5. drop later rows that land on the same parsed instant for a region
//!
//! Grouping uses the timestamp *text*, so `3/22/20 23:45` and
//! `2020-03-22 23:45:00` stay separate until step 5 sees them as one instant.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::domain::{
    ExclusionReason, ExclusionRule, RegionPoint, RegionalRow, RegionalTable, SeriesGranularity, mortality_rate,
};
use crate::io::normalize::NormalizedSnapshot;

#[derive(Debug, Clone, Copy)]
struct GroupTotals {
    timestamp: DateTime<Utc>,
    confirmed: f64,
    deaths: f64,
}

/// Build the regional table for `target_country` from every normalized snapshot.
pub fn aggregate_regional(
    snapshots: &[NormalizedSnapshot],
    target_country: &str,
    exclusions: &[ExclusionRule],
) -> RegionalTable {
    let mut groups: BTreeMap<(String, String, String), GroupTotals> = BTreeMap::new();
    for row in snapshots.iter().flat_map(|s| &s.rows) {
        let key = (row.timestamp_text.clone(), row.country.clone(), row.region.clone());
        let totals = groups.entry(key).or_insert(GroupTotals {
            timestamp: row.timestamp,
            confirmed: 0.0,
            deaths: 0.0,
        });
        totals.confirmed += row.confirmed;
        totals.deaths += row.deaths;
    }

    let mut excluded: HashMap<ExclusionReason, usize> = HashMap::new();
    let mut rows: Vec<RegionalRow> = groups
        .into_iter()
        .filter(|((_, country, _), _)| country == target_country)
        .filter(|((_, _, region), _)| match exclusion_for(region, exclusions) {
            Some(reason) => {
                *excluded.entry(reason).or_default() += 1;
                false
            }
            None => true,
        })
        .map(|((_, country, region), totals)| RegionalRow {
            timestamp: totals.timestamp,
            country,
            region,
            confirmed: totals.confirmed,
            deaths: totals.deaths,
        })
        .collect();

    for (reason, count) in &excluded {
        debug!(?reason, count, "excluded pseudo-region rows");
    }

    rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.region.cmp(&b.region)));

    let before = rows.len();
    rows.dedup_by(|later, earlier| {
        later.timestamp == earlier.timestamp && later.country == earlier.country && later.region == earlier.region
    });
    if rows.len() < before {
        debug!(dropped = before - rows.len(), "dropped rows repeating an earlier instant");
    }

    RegionalTable { rows }
}

/// The first exclusion rule matching `region`, if any.
pub fn exclusion_for(region: &str, exclusions: &[ExclusionRule]) -> Option<ExclusionReason> {
    exclusions.iter().find(|rule| rule.matches(region)).map(|rule| rule.reason)
}

/// One region's series from a regional table, ready for charting.
///
/// Repeated entries collapse to the *last* one per instant (`Update`) or per
/// calendar date (`Daily`). `since` keeps only points on or after that date.
pub fn region_series(
    table: &RegionalTable,
    region: &str,
    granularity: SeriesGranularity,
    since: Option<NaiveDate>,
) -> Vec<RegionPoint> {
    let mut rows: Vec<&RegionalRow> = table
        .rows
        .iter()
        .filter(|r| r.region == region)
        .filter(|r| since.is_none_or(|s| r.timestamp.date_naive() >= s))
        .collect();
    rows.sort_by_key(|r| r.timestamp);

    let same_bucket = |a: DateTime<Utc>, b: DateTime<Utc>| match granularity {
        SeriesGranularity::Update => a == b,
        SeriesGranularity::Daily => a.date_naive() == b.date_naive(),
    };

    let mut points: Vec<RegionPoint> = Vec::with_capacity(rows.len());
    for row in rows {
        let point = RegionPoint {
            timestamp: row.timestamp,
            confirmed: row.confirmed,
            deaths: row.deaths,
            mortality_rate: mortality_rate(Some(row.deaths), Some(row.confirmed)),
        };
        match points.last_mut() {
            Some(last) if same_bucket(last.timestamp, point.timestamp) => *last = point,
            _ => points.push(point),
        }
    }
    points
}
