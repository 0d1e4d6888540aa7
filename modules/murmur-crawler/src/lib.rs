//! murmur-crawler — resilient content crawler for mirror endpoints.
//!
//! Extracts posts from an unreliable, rotating set of mirror sources under
//! anti-scraping pressure: multi-strategy extraction, stall-aware
//! pagination, endpoint failover, cross-run deduplication, and thread
//! reconstruction. Everything below the orchestrator reports failures as
//! counters or boolean outcomes; only exhausted failover and a dead
//! automation backend fail a run.

pub mod crawl;
pub mod extract;
pub mod failover;
pub mod pacing;
pub mod page;
pub mod paginate;
pub mod query;
pub mod selectors;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod threads;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

#[cfg(test)]
mod crawl_tests;

pub use crawl::{CrawlOptions, CrawlReport, Crawler, ProgressFn};
pub use pacing::Pacing;
pub use query::SearchQuery;
pub use session::CrawlSession;
pub use snapshot::Snapshots;
pub use store::RecordStore;
