//! Single-page extraction: scan every post fragment on the current page
//! and fold the new ones into the session.

use std::time::Duration;

use headless_client::{DriverError, PageDriver};
use tracing::{debug, info, warn};

use murmur_common::Record;

use crate::extract;
use crate::pacing::Pacing;
use crate::selectors;
use crate::session::CrawlSession;
use crate::snapshot::Snapshots;

const CONTAINER_TIMEOUT: Duration = Duration::from_secs(15);
const FRAGMENT_PAUSE_EVERY: usize = 3;

/// What one page scan produced. Per-fragment failures are counted, never
/// propagated; only fatal automation errors abort the scan.
#[derive(Debug, Default)]
pub struct PageStats {
    pub new_records: Vec<Record>,
    pub duplicates: u32,
    pub errors: u32,
}

pub async fn extract_page(
    driver: &dyn PageDriver,
    session: &mut CrawlSession,
    pacing: &Pacing,
    snapshots: &Snapshots,
    page_number: u32,
) -> Result<PageStats, DriverError> {
    let mut stats = PageStats::default();

    let outcome = driver
        .wait_for_selector(selectors::FRAGMENT, CONTAINER_TIMEOUT)
        .await;
    if !outcome.found() {
        warn!(page_number, "No post fragments appeared on page");
        return Ok(stats);
    }
    pacing.settle().await;

    let fragments = match driver.query_all(selectors::FRAGMENT).await {
        Ok(fragments) => fragments,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(page_number, error = %e, "Could not enumerate page fragments");
            snapshots
                .capture(driver, &format!("error_page_{page_number}"))
                .await;
            return Ok(stats);
        }
    };
    debug!(page_number, count = fragments.len(), "Scanning fragments");

    let endpoint = session.active_source.clone().unwrap_or_default();
    for (idx, fragment) in fragments.iter().enumerate() {
        if session.cancel.is_cancelled() || session.target_reached() {
            break;
        }

        let id = match extract::resolve_id(fragment.as_ref()).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                stats.errors += 1;
                continue;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!(page_number, error = %e, "Fragment id resolution failed");
                stats.errors += 1;
                continue;
            }
        };

        if !session.is_new(&id) {
            stats.duplicates += 1;
            continue;
        }

        match extract::extract_record(fragment.as_ref(), &id, &endpoint, page_number).await {
            Ok(record) => {
                session.mark_seen(&id);
                stats.new_records.push(record);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!(page_number, id, error = %e, "Fragment extraction failed");
                stats.errors += 1;
            }
        }

        if idx > 0 && idx % FRAGMENT_PAUSE_EVERY == 0 {
            pacing.fragment_pause().await;
        }
    }

    info!(
        page_number,
        new = stats.new_records.len(),
        duplicates = stats.duplicates,
        errors = stats.errors,
        "Page scan complete"
    );
    Ok(stats)
}
