//! Reporting utilities: terminal summaries of a run and of one region.

pub mod format;

pub use format::{format_region_series, format_run_summary};
