//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments (and `.env`)
//! - installs logging
//! - runs the pipeline and prints the summary
//! - writes or reads the assembled payload

use std::time::Duration;

use clap::Parser;
use tracing::info;

use crate::aggregate::region_series;
use crate::cli::{Command, FetchArgs, RegionArgs};
use crate::domain::{PipelineConfig, SeriesGranularity, SourceUrls};
use crate::error::AppError;
use crate::io::payload::{read_payload_json, write_payload_json};

pub mod pipeline;

/// Entry point for the `covid-dash` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    crate::logging::init_logging(&cli.log_level)?;

    match cli.command {
        Command::Fetch(args) => handle_fetch(args),
        Command::Region(args) => handle_region(args),
    }
}

fn handle_fetch(args: FetchArgs) -> Result<(), AppError> {
    let config = pipeline_config_from_args(&args);
    let output = pipeline::run_pipeline(&config)?;

    println!("{}", crate::report::format_run_summary(&output, &config));

    if let Some(path) = &args.out {
        write_payload_json(path, &output.payload())?;
        info!(path = %path.display(), "wrote payload");
    }

    Ok(())
}

fn handle_region(args: RegionArgs) -> Result<(), AppError> {
    let tables = read_payload_json(&args.payload)?.decode()?;

    if !tables.catalog.contains(&args.region) {
        return Err(AppError::new(
            2,
            format!(
                "Unknown region '{}'. Known regions: {}",
                args.region,
                tables.catalog.as_slice().join(", ")
            ),
        ));
    }

    let granularity = if args.daily {
        SeriesGranularity::Daily
    } else {
        SeriesGranularity::Update
    };
    let points = region_series(&tables.regional, &args.region, granularity, args.since);

    println!("{}", crate::report::format_region_series(&args.region, &points));
    Ok(())
}

pub fn pipeline_config_from_args(args: &FetchArgs) -> PipelineConfig {
    PipelineConfig {
        target_country: args.country.clone(),
        urls: SourceUrls::default(),
        cache_path: args.cache_path.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        ..PipelineConfig::default()
    }
}
