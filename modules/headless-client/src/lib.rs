//! headless-client — the browser-automation contract the crawler consumes.
//!
//! The crawler only needs a narrow control surface: navigate, query DOM
//! nodes, bounded waits, and screenshot-on-failure. That surface is two
//! object-safe traits ([`PageDriver`], [`DomNode`]); the production
//! implementation drives a headless Chromium over CDP ([`CdpDriver`]).

pub mod cdp;
pub mod error;

pub use cdp::CdpDriver;
pub use error::{DriverError, Result};

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

/// Default user agent sent with every crawl session.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Result of a bounded wait. Timing out is ordinary data, not an error —
/// callers branch on it instead of catching anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Found,
    TimedOut,
}

impl WaitOutcome {
    pub fn found(self) -> bool {
        matches!(self, WaitOutcome::Found)
    }
}

/// One rendered DOM node, usually a post fragment or something inside one.
#[async_trait]
pub trait DomNode: Send + Sync {
    /// First descendant matching `selector`, if any. "Not found" is
    /// `Ok(None)`; only transport failures are errors.
    async fn query(&self, selector: &str) -> Result<Option<Box<dyn DomNode>>>;

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn DomNode>>>;

    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    async fn inner_text(&self) -> Result<String>;

    /// Run a JS function against this node, with `this` bound to it.
    async fn call_js(&self, function: &str) -> Result<serde_json::Value>;

    async fn click(&self) -> Result<()>;

    async fn scroll_into_view(&self) -> Result<()>;
}

/// A live browser page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> WaitOutcome;

    /// Wait until strictly more than `more_than` nodes match `selector`.
    async fn wait_for_count(
        &self,
        selector: &str,
        more_than: usize,
        timeout: Duration,
    ) -> WaitOutcome;

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn DomNode>>>;

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn DomNode>>>;

    /// Full serialized page content. Used for stall fingerprinting.
    async fn content(&self) -> Result<String>;

    async fn evaluate(&self, js: &str) -> Result<serde_json::Value>;

    async fn scroll_to_bottom(&self) -> Result<()>;

    async fn screenshot(&self, path: &Path) -> Result<()>;
}
