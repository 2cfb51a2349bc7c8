//! HTTP access to the remote feeds.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::error::PipelineError;

const USER_AGENT: &str = concat!("covid-dash/", env!("CARGO_PKG_VERSION"));

/// Anything that can hand back the body behind a URL.
///
/// `FeedClient` is the real implementation; tests plug in canned bodies.
pub trait FeedSource {
    /// Fetch the body at `url`. `source_name` only labels errors and logs.
    fn fetch_text(&self, source_name: &str, url: &str) -> Result<String, PipelineError>;
}

/// Blocking HTTP client with a bounded request timeout.
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            // The directory-listing API rejects requests without a user agent.
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PipelineError::unavailable("http", format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl FeedSource for FeedClient {
    fn fetch_text(&self, source_name: &str, url: &str) -> Result<String, PipelineError> {
        debug!(source = source_name, url, "fetching");

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| PipelineError::unavailable(source_name, format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(PipelineError::unavailable(
                source_name,
                format!("request failed with status {}", resp.status()),
            ));
        }

        resp.text()
            .map_err(|e| PipelineError::unavailable(source_name, format!("failed to read response body: {e}")))
    }
}
