//! Ephemeral per-invocation crawl state.

use std::collections::HashSet;

use murmur_common::{CancelToken, Record};

/// One crawl's mutable state, threaded explicitly through every component
/// call rather than living in ambient globals. Created at crawl start,
/// discarded at crawl end; only `collected` survives, merged into the
/// persisted store.
pub struct CrawlSession {
    pub target_count: usize,
    /// Ids already known, seeded from the persisted store unless the
    /// caller explicitly reset it.
    pub seen_ids: HashSet<String>,
    /// Newly collected records, in discovery order.
    pub collected: Vec<Record>,
    pub cancel: CancelToken,
    /// Mirror endpoint currently serving the crawl; changes on failover.
    pub active_source: Option<String>,
    /// Fingerprint of the last page content that preceded a successful
    /// transition. Used to spot sources that re-serve cached pages.
    pub last_page_fingerprint: Option<[u8; 32]>,
}

impl CrawlSession {
    pub fn new(target_count: usize, seen_ids: HashSet<String>, cancel: CancelToken) -> Self {
        Self {
            target_count,
            seen_ids,
            collected: Vec::new(),
            cancel,
            active_source: None,
            last_page_fingerprint: None,
        }
    }

    pub fn is_new(&self, id: &str) -> bool {
        !self.seen_ids.contains(id)
    }

    pub fn mark_seen(&mut self, id: &str) {
        self.seen_ids.insert(id.to_string());
    }

    pub fn remaining(&self) -> usize {
        self.target_count.saturating_sub(self.collected.len())
    }

    pub fn target_reached(&self) -> bool {
        self.collected.len() >= self.target_count
    }
}
