//! Remote feeds: HTTP client, source fetching, and the testing-feed cache.

pub mod cache;
pub mod client;
pub mod fetch;
pub mod testing;

pub use cache::TestingCache;
pub use client::{FeedClient, FeedSource};
pub use fetch::{Fetcher, RawPayload, SnapshotLink};
pub use testing::{TestingFeed, TestingOrigin, load_testing_feed};
