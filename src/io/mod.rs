//! Input/output helpers.
//!
//! - CSV decoding + cell parsers (`ingest`)
//! - snapshot schema normalization (`normalize`)
//! - payload assembly and JSON read/write (`payload`)

pub mod ingest;
pub mod normalize;
pub mod payload;

pub use ingest::RawTable;
pub use normalize::{NormalizedSnapshot, SchemaNormalizer, SnapshotRow};
pub use payload::{AssembledTables, Payload, assemble, read_payload_json, write_payload_json};
