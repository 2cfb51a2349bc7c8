//! Command-line parsing.
//!
//! Flags and environment variables are only read here; the library side gets a
//! fully built `PipelineConfig`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "covid-dash", version, about = "Epidemiological feed ingestion and reshaping")]
pub struct Cli {
    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every feed, build the tables, and print a summary.
    Fetch(FetchArgs),
    /// Print one region's series from a saved payload.
    Region(RegionArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FetchArgs {
    /// Country whose national and regional tables are built.
    #[arg(long, env = "COVID_DASH_COUNTRY", default_value = "US")]
    pub country: String,

    /// Cache file for the testing feed.
    #[arg(long, env = "COVID_DASH_CACHE_PATH", default_value = "testing_us.json")]
    pub cache_path: PathBuf,

    /// HTTP request timeout in seconds.
    #[arg(long, env = "COVID_DASH_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Write the assembled payload (JSON) to this file.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct RegionArgs {
    /// Payload JSON written by `covid-dash fetch --out`.
    #[arg(long, value_name = "JSON")]
    pub payload: PathBuf,

    /// Region name, exactly as listed in the payload's region catalog.
    #[arg(long)]
    pub region: String,

    /// Keep only the latest update of each calendar day.
    #[arg(long)]
    pub daily: bool,

    /// Drop points before this date (YYYY-MM-DD).
    #[arg(long)]
    pub since: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_defaults() {
        let cli = Cli::parse_from(["covid-dash", "fetch"]);
        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(cli.log_level, "info");
        assert_eq!(args.timeout_secs, 30);
        assert!(args.out.is_none());
    }

    #[test]
    fn region_parses_since_date() {
        let cli = Cli::parse_from([
            "covid-dash",
            "region",
            "--payload",
            "p.json",
            "--region",
            "Georgia",
            "--daily",
            "--since",
            "2020-03-01",
        ]);
        let Command::Region(args) = cli.command else {
            panic!("expected region");
        };
        assert!(args.daily);
        assert_eq!(args.since, NaiveDate::from_ymd_opt(2020, 3, 1));
    }
}
