//! Crawl orchestration: endpoint acquisition, the page loop, and the final
//! merge-and-persist step.

use headless_client::PageDriver;
use tracing::{info, warn};

use murmur_common::{CancelToken, MurmurError};

use crate::failover::{AcquireOutcome, SourceFailover};
use crate::pacing::Pacing;
use crate::page;
use crate::paginate;
use crate::query::SearchQuery;
use crate::session::CrawlSession;
use crate::snapshot::Snapshots;
use crate::store::{self, RecordStore};
use crate::threads;

const MAX_CONSECUTIVE_EMPTY: u32 = 10;

/// Progress callback: (collected so far, target).
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    pub target_count: usize,
    /// Delete the persisted store before crawling.
    pub fresh_start: bool,
    /// Do not seed the dedup set from the store; previously seen posts are
    /// collected again and overwrite their stored versions on save.
    pub ignore_existing: bool,
}

#[derive(Debug)]
pub struct CrawlReport {
    pub success: bool,
    pub collected_count: usize,
    pub duplicates: u32,
    pub errors: u32,
    pub pages: u32,
    pub persisted_total: usize,
    pub failure: Option<MurmurError>,
}

pub struct Crawler {
    failover: SourceFailover,
    store: RecordStore,
    pacing: Pacing,
    snapshots: Snapshots,
    max_consecutive_empty: u32,
}

impl Crawler {
    pub fn new(
        failover: SourceFailover,
        store: RecordStore,
        pacing: Pacing,
        snapshots: Snapshots,
    ) -> Self {
        Self {
            failover,
            store,
            pacing,
            snapshots,
            max_consecutive_empty: MAX_CONSECUTIVE_EMPTY,
        }
    }

    /// How many consecutive pages may yield nothing new before the crawl
    /// gives up on the source.
    pub fn with_empty_page_threshold(mut self, threshold: u32) -> Self {
        self.max_consecutive_empty = threshold;
        self
    }

    pub async fn run(
        &self,
        driver: &dyn PageDriver,
        query: &SearchQuery,
        opts: &CrawlOptions,
        cancel: CancelToken,
        progress: Option<&ProgressFn>,
    ) -> CrawlReport {
        let mut report = CrawlReport {
            success: false,
            collected_count: 0,
            duplicates: 0,
            errors: 0,
            pages: 0,
            persisted_total: 0,
            failure: None,
        };

        if opts.fresh_start {
            self.store.reset();
        }
        let prior = self.store.load();
        let seen = if opts.ignore_existing {
            Default::default()
        } else {
            store::seen_ids(&prior)
        };
        info!(
            prior = prior.len(),
            target = opts.target_count,
            terms = %query.terms(),
            "Starting crawl"
        );

        let mut session = CrawlSession::new(opts.target_count, seen, cancel);

        if opts.target_count == 0 {
            return self.finalize(report, prior, session);
        }

        match self
            .failover
            .acquire(driver, query, &self.pacing, &self.snapshots)
            .await
        {
            AcquireOutcome::Live { endpoint } => session.active_source = Some(endpoint),
            AcquireOutcome::Exhausted { attempted } => {
                warn!(attempted, "No mirror endpoint is serving results");
                report.failure = Some(MurmurError::SourceUnavailable { attempted });
                return report;
            }
            AcquireOutcome::Fatal(e) => {
                report.failure = Some(MurmurError::FatalAutomation(e.to_string()));
                return report;
            }
        }

        let mut page_number: u32 = 1;
        let mut consecutive_empty: u32 = 0;
        let mut fatal: Option<MurmurError> = None;

        while !session.target_reached() && !session.cancel.is_cancelled() {
            let stats = match page::extract_page(
                driver,
                &mut session,
                &self.pacing,
                &self.snapshots,
                page_number,
            )
            .await
            {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(page_number, error = %e, "Fatal automation error, stopping crawl");
                    self.snapshots.capture(driver, "fatal_error").await;
                    fatal = Some(MurmurError::FatalAutomation(e.to_string()));
                    break;
                }
            };

            report.pages += 1;
            report.duplicates += stats.duplicates;
            report.errors += stats.errors;

            if stats.new_records.is_empty() {
                consecutive_empty += 1;
            } else {
                consecutive_empty = 0;
                let room = session.remaining();
                session
                    .collected
                    .extend(stats.new_records.into_iter().take(room));
            }
            if let Some(progress) = progress {
                progress(session.collected.len(), session.target_count);
            }
            if session.target_reached() || session.cancel.is_cancelled() {
                break;
            }
            if consecutive_empty >= self.max_consecutive_empty {
                warn!(consecutive_empty, "Too many empty pages in a row, stopping");
                break;
            }

            // A failed transition counts toward the same threshold as an
            // empty page; the retry re-scans the current page, where
            // everything dedupes, before trying to advance again.
            if !paginate::advance(
                driver,
                &mut session,
                &self.pacing,
                &self.snapshots,
                page_number,
            )
            .await
            {
                consecutive_empty += 1;
                if consecutive_empty >= self.max_consecutive_empty {
                    warn!(page_number, "Pagination failed repeatedly, stopping");
                    break;
                }
                self.pacing.page_pause().await;
                continue;
            }

            self.pacing.page_pause().await;
            page_number += 1;
        }

        report.failure = fatal;
        self.finalize(report, prior, session)
    }

    /// Always runs once collection started: whatever was collected gets
    /// thread-annotated, merged over the prior store, and persisted, even
    /// after cancellation or a fatal error mid-crawl.
    fn finalize(
        &self,
        mut report: CrawlReport,
        prior: Vec<murmur_common::Record>,
        session: CrawlSession,
    ) -> CrawlReport {
        report.collected_count = session.collected.len();

        let grouped = threads::group_threads(session.collected);
        let merged = store::merge(prior, &grouped);
        match self.store.save(&merged) {
            Ok(total) => report.persisted_total = total,
            Err(e) => {
                warn!(error = %e, "Failed to persist record store");
                report.failure.get_or_insert_with(|| {
                    MurmurError::FatalAutomation(format!("persist failed: {e}"))
                });
            }
        }

        report.success = report.failure.is_none();
        info!(
            collected = report.collected_count,
            duplicates = report.duplicates,
            errors = report.errors,
            pages = report.pages,
            persisted = report.persisted_total,
            success = report.success,
            "Crawl finished"
        );
        report
    }
}
