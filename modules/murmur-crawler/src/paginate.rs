//! Pagination with stall detection.
//!
//! Mirrors serve results either with an explicit load-more control or as an
//! infinite scroll. A transition only counts as progress when the page
//! content actually changed; sources that re-serve the same page (a common
//! rate-limit symptom) are caught by comparing content fingerprints before
//! and after.

use std::time::Duration;

use headless_client::{DomNode, PageDriver};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::pacing::Pacing;
use crate::selectors;
use crate::session::CrawlSession;
use crate::snapshot::Snapshots;

const REATTACH_TIMEOUT: Duration = Duration::from_secs(15);

pub fn fingerprint(content: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.finalize().into()
}

/// Try to move to the next page of results. Returns `true` only when a
/// transition happened and produced genuinely different content.
pub async fn advance(
    driver: &dyn PageDriver,
    session: &mut CrawlSession,
    pacing: &Pacing,
    snapshots: &Snapshots,
    page_number: u32,
) -> bool {
    pacing.pre_pagination().await;

    let pre = match driver.content().await {
        Ok(content) => content,
        Err(e) => {
            warn!(page_number, error = %e, "Cannot read page content before pagination");
            return false;
        }
    };
    let pre_hash = fingerprint(&pre);

    for selector in selectors::LOAD_MORE {
        match driver.query(selector).await {
            Ok(Some(control)) => {
                debug!(page_number, selector, "Found load-more control");
                if !click_through(driver, control, pacing, snapshots, page_number).await {
                    return false;
                }
                return verify_progress(driver, session, snapshots, page_number, pre_hash).await;
            }
            Ok(None) => continue,
            Err(e) => {
                debug!(selector, error = %e, "Load-more lookup failed");
                continue;
            }
        }
    }

    debug!(page_number, "No load-more control, falling back to scroll");
    if !scroll_through(driver, pacing, page_number).await {
        return false;
    }
    verify_progress(driver, session, snapshots, page_number, pre_hash).await
}

async fn click_through(
    driver: &dyn PageDriver,
    control: Box<dyn DomNode>,
    pacing: &Pacing,
    snapshots: &Snapshots,
    page_number: u32,
) -> bool {
    if let Err(e) = control.scroll_into_view().await {
        debug!(page_number, error = %e, "Could not scroll load-more into view");
    }
    pacing.settle().await;

    // JS click rather than a synthesized mouse event: the control may have
    // moved since we queried it, and a detached-handle click navigates
    // nowhere without an error.
    if let Err(e) = control.call_js("function() { this.click(); }").await {
        warn!(page_number, error = %e, "Load-more click failed");
        return false;
    }

    if driver
        .wait_for_selector(selectors::FRAGMENT, REATTACH_TIMEOUT)
        .await
        .found()
    {
        true
    } else {
        warn!(page_number, "Fragments never reappeared after load-more");
        snapshots
            .capture(driver, &format!("load_more_fail_{page_number}"))
            .await;
        false
    }
}

async fn scroll_through(driver: &dyn PageDriver, pacing: &Pacing, page_number: u32) -> bool {
    let before = match driver.query_all(selectors::FRAGMENT).await {
        Ok(fragments) => fragments.len(),
        Err(e) => {
            warn!(page_number, error = %e, "Cannot count fragments before scroll");
            return false;
        }
    };

    if let Err(e) = driver.scroll_to_bottom().await {
        warn!(page_number, error = %e, "Scroll failed");
        return false;
    }
    pacing.scroll_wait().await;

    if driver
        .wait_for_count(selectors::FRAGMENT, before, REATTACH_TIMEOUT)
        .await
        .found()
    {
        true
    } else {
        info!(page_number, "Scroll produced no additional fragments");
        false
    }
}

/// A transition stalls when the post-transition content matches either the
/// pre-transition content or the page before that. The two-deep check
/// catches sources alternating between two cached responses.
async fn verify_progress(
    driver: &dyn PageDriver,
    session: &mut CrawlSession,
    snapshots: &Snapshots,
    page_number: u32,
    pre_hash: [u8; 32],
) -> bool {
    let post = match driver.content().await {
        Ok(content) => content,
        Err(e) => {
            warn!(page_number, error = %e, "Cannot read page content after pagination");
            return false;
        }
    };
    let post_hash = fingerprint(&post);

    if post_hash == pre_hash || Some(post_hash) == session.last_page_fingerprint {
        warn!(page_number, "Pagination stalled, source is re-serving content");
        snapshots
            .capture(driver, &format!("stalled_page_{page_number}"))
            .await;
        return false;
    }

    session.last_page_fingerprint = Some(pre_hash);
    true
}
