//! Diagnostic page snapshots captured at failure sites.

use std::path::PathBuf;

use chrono::Utc;
use headless_client::PageDriver;
use tracing::{debug, warn};

/// Writes timestamped full-page screenshots into a directory. Capture is
/// best-effort: a snapshot that cannot be taken is logged and dropped,
/// never an error.
#[derive(Debug, Clone)]
pub struct Snapshots {
    dir: PathBuf,
}

impl Snapshots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn capture(&self, driver: &dyn PageDriver, label: &str) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "Cannot create snapshot directory");
            return;
        }
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("{timestamp}_{label}.png"));
        match driver.screenshot(&path).await {
            Ok(()) => debug!(path = %path.display(), "Saved diagnostic snapshot"),
            Err(e) => warn!(label, error = %e, "Failed to capture diagnostic snapshot"),
        }
    }
}
