//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - date-indexed series (`TimeSeries`)
//! - the output tables (`NationalTable`, `RegionalTable`, `RegionCatalog`)
//! - source descriptors and run configuration (`SourceDescriptor`, `PipelineConfig`)

pub mod types;

pub use types::*;
