//! Mirror endpoint failover.
//!
//! Candidate endpoints are tried in configured order until one serves a
//! results page with at least one post fragment. Anything short of that
//! (navigation failure, empty page, block page) disqualifies the candidate
//! and moves on after an increasing randomized back-off.

use std::time::Duration;

use headless_client::{DriverError, PageDriver};
use tracing::{info, warn};

use crate::pacing::Pacing;
use crate::query::SearchQuery;
use crate::selectors;
use crate::snapshot::Snapshots;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
const RESULTS_TIMEOUT: Duration = Duration::from_secs(15);

pub enum AcquireOutcome {
    /// An endpoint is serving results; the page is loaded and ready.
    Live { endpoint: String },
    /// Every candidate was tried and none served results.
    Exhausted { attempted: usize },
    /// The browser itself died; no endpoint can help.
    Fatal(DriverError),
}

pub struct SourceFailover {
    endpoints: Vec<String>,
}

impl SourceFailover {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self { endpoints }
    }

    pub async fn acquire(
        &self,
        driver: &dyn PageDriver,
        query: &SearchQuery,
        pacing: &Pacing,
        snapshots: &Snapshots,
    ) -> AcquireOutcome {
        for (attempt, endpoint) in self.endpoints.iter().enumerate() {
            let url = query.url_for(endpoint);
            info!(endpoint, attempt = attempt + 1, "Trying mirror endpoint");

            match driver.goto(&url, NAVIGATION_TIMEOUT).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return AcquireOutcome::Fatal(e),
                Err(e) => {
                    warn!(endpoint, error = %e, "Navigation failed");
                    snapshots.capture(driver, &endpoint_label(endpoint)).await;
                    pacing.endpoint_backoff(attempt as u32).await;
                    continue;
                }
            }
            pacing.settle().await;

            if driver
                .wait_for_selector(selectors::FRAGMENT, RESULTS_TIMEOUT)
                .await
                .found()
            {
                info!(endpoint, "Endpoint is serving results");
                return AcquireOutcome::Live {
                    endpoint: endpoint.clone(),
                };
            }
            warn!(endpoint, "Endpoint loaded but served no results");
            snapshots.capture(driver, &endpoint_label(endpoint)).await;
            pacing.endpoint_backoff(attempt as u32).await;
        }

        AcquireOutcome::Exhausted {
            attempted: self.endpoints.len(),
        }
    }
}

fn endpoint_label(endpoint: &str) -> String {
    let host = endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .replace(['/', ':'], "_");
    format!("error_{host}")
}
