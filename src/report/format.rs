//! Formatted terminal output.
//!
//! Formatting lives here so the pipeline code never prints.

use crate::app::pipeline::PipelineOutput;
use crate::domain::{PipelineConfig, RegionPoint};
use crate::io::payload::format_timestamp;

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value.map(|v| format!("{v:.decimals$}")).unwrap_or_else(|| "-".to_string())
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}%", v * 100.0)).unwrap_or_else(|| "-".to_string())
}

/// Format the run summary: table sizes, latest national figures, and what degraded.
pub fn format_run_summary(output: &PipelineOutput, config: &PipelineConfig) -> String {
    let mut out = String::new();
    let diag = &output.diagnostics;

    out.push_str(&format!("=== covid-dash - {} ===\n", config.target_country));

    let national = &output.national;
    match (national.rows.first(), national.latest()) {
        (Some(first), Some(last)) => out.push_str(&format!(
            "National: {} rows | {} .. {}\n",
            national.rows.len(),
            first.date,
            last.date
        )),
        _ => out.push_str("National: no rows\n"),
    }

    if let Some(latest) = national.latest() {
        out.push_str(&format!(
            "  latest {}: tested={} confirmed={} deaths={} mortality={}\n",
            latest.date,
            fmt_opt(latest.tested, 0),
            fmt_opt(latest.confirmed, 0),
            fmt_opt(latest.deaths, 0),
            fmt_pct(latest.mortality_rate),
        ));
    }
    out.push_str(&format!("  testing feed: {}\n", diag.testing_origin.label()));

    out.push_str(&format!(
        "Regional: {} rows | {} regions | {}/{} snapshot files used\n",
        output.regional.rows.len(),
        output.catalog.len(),
        diag.snapshots_used,
        diag.snapshots_listed,
    ));
    if diag.rows_dropped > 0 {
        out.push_str(&format!("  {} rows dropped (unparsable timestamp)\n", diag.rows_dropped));
    }
    if diag.rows_unlocated > 0 {
        out.push_str(&format!("  {} rows dropped (no country or region)\n", diag.rows_unlocated));
    }
    for skipped in &diag.skipped {
        out.push_str(&format!("  skipped {}: {}\n", skipped.name, skipped.reason));
    }

    if !output.catalog.is_empty() {
        out.push_str(&format!("Regions: {}\n", output.catalog.as_slice().join(", ")));
    }

    out
}

/// Format one region's series as an aligned table.
pub fn format_region_series(region: &str, points: &[RegionPoint]) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {region} ({} points) ===\n", points.len()));
    out.push_str(&format!(
        "{:<25} {:>12} {:>10} {:>10}\n",
        "timestamp", "confirmed", "deaths", "mortality"
    ));
    for p in points {
        out.push_str(&format!(
            "{:<25} {:>12.0} {:>10.0} {:>10}\n",
            format_timestamp(p.timestamp),
            p.confirmed,
            p.deaths,
            fmt_pct(p.mortality_rate),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    #[test]
    fn undefined_mortality_prints_placeholder() {
        let ts = DateTime::parse_from_rfc3339("2020-03-22T23:45:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let points = vec![
            RegionPoint {
                timestamp: ts,
                confirmed: 0.0,
                deaths: 0.0,
                mortality_rate: None,
            },
            RegionPoint {
                timestamp: ts,
                confirmed: 200.0,
                deaths: 5.0,
                mortality_rate: Some(0.025),
            },
        ];
        let text = format_region_series("Georgia", &points);
        assert!(text.starts_with("=== Georgia (2 points) ==="));
        assert!(text.contains("2020-03-22T23:45:00Z"));
        assert!(text.contains("2.50%"));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[2].trim_end().ends_with('-'));
    }
}
