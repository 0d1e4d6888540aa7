//! Randomized politeness delays.
//!
//! Every page transition, every batch of extracted fragments, and every
//! inter-endpoint retry pauses for a random duration within a configured
//! range. The ranges are tunable but the pauses themselves are part of the
//! crawl contract: a uniform request cadence is exactly the signature that
//! gets a session blocked.

use std::ops::Range;
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct Pacing {
    /// After a page finishes loading, before scanning it (ms).
    pub settle_ms: Range<u64>,
    /// Every few fragments during extraction (ms).
    pub fragment_ms: Range<u64>,
    /// Between pages (ms).
    pub page_ms: Range<u64>,
    /// Before attempting a pagination transition (ms).
    pub pre_pagination_ms: Range<u64>,
    /// After triggering a scroll, before checking for new content (ms).
    pub scroll_ms: Range<u64>,
    /// Base delay between mirror endpoint attempts (ms); scaled up with
    /// each failed attempt.
    pub endpoint_ms: Range<u64>,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle_ms: 1_000..3_000,
            fragment_ms: 500..2_000,
            page_ms: 2_000..6_000,
            pre_pagination_ms: 2_000..5_000,
            scroll_ms: 3_000..6_000,
            endpoint_ms: 3_000..7_000,
        }
    }
}

impl Pacing {
    /// No delays at all. Tests only.
    pub fn zero() -> Self {
        Self {
            settle_ms: 0..0,
            fragment_ms: 0..0,
            page_ms: 0..0,
            pre_pagination_ms: 0..0,
            scroll_ms: 0..0,
            endpoint_ms: 0..0,
        }
    }

    pub async fn settle(&self) {
        pause(self.settle_ms.clone()).await;
    }

    pub async fn fragment_pause(&self) {
        pause(self.fragment_ms.clone()).await;
    }

    pub async fn page_pause(&self) {
        pause(self.page_ms.clone()).await;
    }

    pub async fn pre_pagination(&self) {
        pause(self.pre_pagination_ms.clone()).await;
    }

    pub async fn scroll_wait(&self) {
        pause(self.scroll_ms.clone()).await;
    }

    /// Increasing randomized back-off between endpoint attempts: the base
    /// range scaled by how many candidates have already failed.
    pub async fn endpoint_backoff(&self, failed_attempts: u32) {
        if self.endpoint_ms.is_empty() {
            return;
        }
        let base = rand::rng().random_range(self.endpoint_ms.clone());
        let scaled = base.saturating_mul(u64::from(failed_attempts) + 1);
        tokio::time::sleep(Duration::from_millis(scaled)).await;
    }
}

async fn pause(range: Range<u64>) {
    if range.is_empty() {
        return;
    }
    let ms = rand::rng().random_range(range);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
