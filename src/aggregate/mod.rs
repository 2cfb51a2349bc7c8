//! National and regional aggregation.

pub mod national;
pub mod regional;

pub use national::{collapse_wide_series, merge_national};
pub use regional::{aggregate_regional, exclusion_for, region_series};
