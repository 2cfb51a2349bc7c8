//! Fetch a described source and decode its body as the declared shape.

use serde_json::Value;
use tracing::{debug, info};

use crate::data::client::FeedSource;
use crate::domain::{SourceDescriptor, SourceShape};
use crate::error::PipelineError;
use crate::io::ingest::RawTable;

/// A decoded remote body.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Table(RawTable),
    Records(Vec<Value>),
    Listing(Vec<SnapshotLink>),
}

/// One per-day snapshot file found in the directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLink {
    pub name: String,
    pub url: String,
}

impl RawPayload {
    pub fn into_table(self, source_name: &str) -> Result<RawTable, PipelineError> {
        match self {
            RawPayload::Table(table) => Ok(table),
            other => Err(shape_mismatch(source_name, "CSV table", &other)),
        }
    }

    pub fn into_records(self, source_name: &str) -> Result<Vec<Value>, PipelineError> {
        match self {
            RawPayload::Records(records) => Ok(records),
            other => Err(shape_mismatch(source_name, "JSON array", &other)),
        }
    }

    pub fn into_listing(self, source_name: &str) -> Result<Vec<SnapshotLink>, PipelineError> {
        match self {
            RawPayload::Listing(links) => Ok(links),
            other => Err(shape_mismatch(source_name, "directory listing", &other)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            RawPayload::Table(_) => "CSV table",
            RawPayload::Records(_) => "JSON array",
            RawPayload::Listing(_) => "directory listing",
        }
    }
}

fn shape_mismatch(source_name: &str, expected: &str, got: &RawPayload) -> PipelineError {
    PipelineError::unavailable(source_name, format!("expected a {expected}, got a {}", got.kind()))
}

/// Fetches sources through a [`FeedSource`], one at a time.
pub struct Fetcher<'a> {
    source: &'a dyn FeedSource,
}

impl<'a> Fetcher<'a> {
    pub fn new(source: &'a dyn FeedSource) -> Self {
        Self { source }
    }

    /// Fetch and decode `desc`.
    ///
    /// Transport failures and bodies that do not decode as `desc.shape` are
    /// both [`PipelineError::SourceUnavailable`].
    pub fn fetch(&self, desc: &SourceDescriptor) -> Result<RawPayload, PipelineError> {
        let body = self.source.fetch_text(&desc.name, &desc.url)?;
        let payload = decode_body(desc, &body)?;
        match &payload {
            RawPayload::Table(t) => debug!(source = %desc.name, rows = t.rows.len(), "decoded CSV"),
            RawPayload::Records(r) => debug!(source = %desc.name, records = r.len(), "decoded JSON"),
            RawPayload::Listing(l) => info!(source = %desc.name, files = l.len(), "resolved snapshot files"),
        }
        Ok(payload)
    }

    /// Fetch one snapshot file found in the listing.
    pub fn fetch_snapshot(&self, link: &SnapshotLink) -> Result<RawTable, PipelineError> {
        let desc = SourceDescriptor::new(&link.name, &link.url, SourceShape::Csv);
        self.fetch(&desc)?.into_table(&link.name)
    }
}

/// Decode a body according to the descriptor's shape.
pub fn decode_body(desc: &SourceDescriptor, body: &str) -> Result<RawPayload, PipelineError> {
    match desc.shape {
        SourceShape::Csv => RawTable::from_csv_str(&desc.name, body).map(RawPayload::Table),
        SourceShape::JsonArray => parse_json_array(&desc.name, body).map(RawPayload::Records),
        SourceShape::DirectoryListing => {
            let entries = parse_json_array(&desc.name, body)?;
            Ok(RawPayload::Listing(resolve_snapshot_links(&entries)))
        }
    }
}

pub fn parse_json_array(source_name: &str, body: &str) -> Result<Vec<Value>, PipelineError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| PipelineError::unavailable(source_name, format!("invalid JSON: {e}")))?;
    match value {
        Value::Array(items) => Ok(items),
        // Rate-limited API responses come back as an object with a `message`.
        Value::Object(map) => {
            let message = map.get("message").and_then(Value::as_str).unwrap_or("no message");
            Err(PipelineError::unavailable(
                source_name,
                format!("expected a JSON array, got an object ({message})"),
            ))
        }
        other => Err(PipelineError::unavailable(
            source_name,
            format!("expected a JSON array, got {other}"),
        )),
    }
}

/// Keep listing entries whose path ends in `.csv` and that carry a download link.
pub fn resolve_snapshot_links(entries: &[Value]) -> Vec<SnapshotLink> {
    entries
        .iter()
        .filter_map(|entry| {
            let path = entry.get("path")?.as_str()?;
            if !path.to_ascii_lowercase().ends_with(".csv") {
                return None;
            }
            let url = entry.get("download_url")?.as_str()?;
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(path).to_string());
            Some(SnapshotLink {
                name,
                url: url.to_string(),
            })
        })
        .collect()
}
