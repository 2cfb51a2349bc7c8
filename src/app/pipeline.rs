//! The ingestion pipeline, shared by every front-end.
//!
//! fetch global series -> testing feed (with cache) -> national table
//! -> directory listing -> snapshots -> normalize -> regional table -> catalog
//!
//! Everything runs sequentially on the calling thread and the result is one
//! immutable `PipelineOutput`; nothing is published before the run finishes.

use tracing::{info, warn};

use crate::aggregate::{aggregate_regional, collapse_wide_series, merge_national};
use crate::data::{FeedClient, FeedSource, Fetcher, TestingCache, TestingOrigin, load_testing_feed};
use crate::domain::{NationalTable, PipelineConfig, RegionCatalog, RegionalTable};
use crate::error::PipelineError;
use crate::io::payload::{Payload, assemble};
use crate::io::normalize::SchemaNormalizer;

/// A snapshot file left out of the regional table, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// What degraded during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunDiagnostics {
    pub testing_origin: TestingOrigin,
    /// Snapshot files named by the directory listing.
    pub snapshots_listed: usize,
    pub snapshots_used: usize,
    pub skipped: Vec<SkippedFile>,
    /// Snapshot rows dropped for unparsable timestamps.
    pub rows_dropped: usize,
    /// Snapshot rows dropped for an empty country or region.
    pub rows_unlocated: usize,
}

/// All outputs of a single pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub national: NationalTable,
    pub regional: RegionalTable,
    pub catalog: RegionCatalog,
    pub diagnostics: RunDiagnostics,
}

impl PipelineOutput {
    pub fn payload(&self) -> Payload {
        assemble(&self.national, &self.regional, &self.catalog)
    }
}

/// Run the pipeline against the live feeds.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutput, PipelineError> {
    let client = FeedClient::new(config.timeout)?;
    run_with_source(config, &client)
}

/// Run the pipeline against any feed source.
///
/// Fails only when a global series or the directory listing is unavailable;
/// the testing feed and individual snapshot files degrade instead.
pub fn run_with_source(config: &PipelineConfig, source: &dyn FeedSource) -> Result<PipelineOutput, PipelineError> {
    let fetcher = Fetcher::new(source);
    let country = config.target_country.as_str();

    // 1) National table.
    let confirmed_src = config.urls.confirmed_source();
    let confirmed_raw = fetcher.fetch(&confirmed_src)?.into_table(&confirmed_src.name)?;
    let confirmed = collapse_wide_series(&confirmed_raw, country)?;

    let deaths_src = config.urls.deaths_source();
    let deaths_raw = fetcher.fetch(&deaths_src)?.into_table(&deaths_src.name)?;
    let deaths = collapse_wide_series(&deaths_raw, country)?;

    let cache = TestingCache::new(&config.cache_path);
    let testing = load_testing_feed(&fetcher, &config.urls.testing_source(), &cache);

    let national = merge_national(testing.series.as_ref(), &confirmed, &deaths);
    info!(rows = national.rows.len(), testing = testing.origin.label(), "built national table");

    // 2) Regional table.
    let listing_src = config.urls.listing_source();
    let links = fetcher.fetch(&listing_src)?.into_listing(&listing_src.name)?;

    let normalizer = SchemaNormalizer::new(country);
    let mut snapshots = Vec::with_capacity(links.len());
    let mut skipped = Vec::new();
    let mut rows_dropped = 0usize;
    let mut rows_unlocated = 0usize;

    for link in &links {
        let normalized = fetcher
            .fetch_snapshot(link)
            .and_then(|raw| normalizer.normalize(&raw));
        match normalized {
            Ok(snapshot) => {
                rows_dropped += snapshot.rows_dropped;
                rows_unlocated += snapshot.rows_unlocated;
                snapshots.push(snapshot);
            }
            Err(e) => {
                warn!(file = %link.name, error = %e, "skipping snapshot file");
                skipped.push(SkippedFile {
                    name: link.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let regional = aggregate_regional(&snapshots, country, &config.exclusions);
    let catalog = RegionCatalog::from_table(&regional);
    info!(
        rows = regional.rows.len(),
        regions = catalog.len(),
        files = snapshots.len(),
        skipped = skipped.len(),
        "built regional table"
    );

    Ok(PipelineOutput {
        national,
        regional,
        catalog,
        diagnostics: RunDiagnostics {
            testing_origin: testing.origin,
            snapshots_listed: links.len(),
            snapshots_used: snapshots.len(),
            skipped,
            rows_dropped,
            rows_unlocated,
        },
    })
}
