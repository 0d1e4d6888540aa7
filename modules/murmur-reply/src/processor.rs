//! Drives the reply pipeline over a batch of crawled records.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use murmur_common::Record;

use crate::traits::{ReplyComposer, ReplyPoster};

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);
const DEFAULT_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, PartialEq, Eq)]
pub enum ReplyStatus {
    Posted { posted_id: String },
    /// Already in the ledger; nothing was sent.
    Skipped,
    Failed(String),
}

/// Composes and posts one reply per record, remembering every record it
/// has already handled in an on-disk ledger. Failures are retried with
/// jittered exponential backoff and never mark the record processed, so a
/// later run picks it up again.
pub struct ReplyProcessor {
    composer: Arc<dyn ReplyComposer>,
    poster: Arc<dyn ReplyPoster>,
    ledger_path: PathBuf,
    processed: HashSet<String>,
    attempts: u32,
    backoff_base: Duration,
    delay_between: Duration,
}

impl ReplyProcessor {
    pub fn new(
        composer: Arc<dyn ReplyComposer>,
        poster: Arc<dyn ReplyPoster>,
        ledger_path: impl Into<PathBuf>,
    ) -> Self {
        let ledger_path = ledger_path.into();
        let processed = load_ledger(&ledger_path);
        Self {
            composer,
            poster,
            ledger_path,
            processed,
            attempts: DEFAULT_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            delay_between: DEFAULT_DELAY,
        }
    }

    pub fn with_pacing(mut self, delay_between: Duration, backoff_base: Duration) -> Self {
        self.delay_between = delay_between;
        self.backoff_base = backoff_base;
        self
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Handle a whole batch, pausing between posts.
    pub async fn process_all(&mut self, records: &[Record]) -> Vec<(String, ReplyStatus)> {
        let mut results = Vec::with_capacity(records.len());
        let mut posted_any = false;
        for record in records {
            if posted_any && !self.delay_between.is_zero() {
                tokio::time::sleep(self.delay_between).await;
            }
            let status = self.process(record).await;
            posted_any = matches!(status, ReplyStatus::Posted { .. });
            results.push((record.id.clone(), status));
        }
        results
    }

    pub async fn process(&mut self, record: &Record) -> ReplyStatus {
        if self.processed.contains(&record.id) {
            return ReplyStatus::Skipped;
        }
        if record.body_text.trim().is_empty() {
            return ReplyStatus::Failed("record has no text to reply to".to_string());
        }

        let mut last_error = String::new();
        for attempt in 0..self.attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
            match self.attempt(record).await {
                Ok(posted_id) => {
                    info!(id = %record.id, posted_id, "Reply posted");
                    self.mark_processed(&record.id);
                    return ReplyStatus::Posted { posted_id };
                }
                Err(e) => {
                    warn!(id = %record.id, attempt = attempt + 1, error = %e, "Reply attempt failed");
                    last_error = e.to_string();
                }
            }
        }
        ReplyStatus::Failed(last_error)
    }

    async fn attempt(&self, record: &Record) -> anyhow::Result<String> {
        let text = self
            .composer
            .compose(&record.body_text)
            .await
            .context("composing reply")?;
        self.poster
            .post(&text, &record.id)
            .await
            .context("posting reply")
    }

    fn backoff(&self, attempt: u32) -> Duration {
        if self.backoff_base.is_zero() {
            return Duration::ZERO;
        }
        let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
        self.backoff_base * 2u32.saturating_pow(attempt - 1) + jitter
    }

    fn mark_processed(&mut self, id: &str) {
        self.processed.insert(id.to_string());
        if let Err(e) = save_ledger(&self.ledger_path, &self.processed) {
            // Worst case the record is replied to again next run.
            warn!(error = %e, "Could not persist reply ledger");
        }
    }
}

fn load_ledger(path: &Path) -> HashSet<String> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Reply ledger is corrupt, starting empty");
            HashSet::new()
        }),
        Err(_) => HashSet::new(),
    }
}

fn save_ledger(path: &Path, processed: &HashSet<String>) -> anyhow::Result<()> {
    let mut ids: Vec<&String> = processed.iter().collect();
    ids.sort();
    let json = serde_json::to_vec_pretty(&ids)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{TestComposer, TestPoster};
    use async_trait::async_trait;
    use chrono::Utc;

    struct FailingPoster;

    #[async_trait]
    impl ReplyPoster for FailingPoster {
        async fn post(&self, _text: &str, _in_reply_to: &str) -> anyhow::Result<String> {
            anyhow::bail!("rate limited")
        }
    }

    fn record(id: &str, body: &str) -> Record {
        Record {
            id: id.to_string(),
            url: String::new(),
            author_handle: "@a".into(),
            author_display_name: String::new(),
            body_text: body.to_string(),
            published_at: String::new(),
            engagement: Default::default(),
            media: None,
            reply_target_handles: None,
            reply_target_id: None,
            source_endpoint: String::new(),
            fetched_at: Utc::now(),
            page_found: 1,
            thread_position: None,
            thread_size: None,
            thread_key: None,
        }
    }

    fn processor(dir: &Path, poster: Arc<dyn ReplyPoster>) -> ReplyProcessor {
        ReplyProcessor::new(
            Arc::new(TestComposer),
            poster,
            dir.join("processed_posts.json"),
        )
        .with_pacing(Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn posts_once_and_skips_thereafter() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = processor(dir.path(), Arc::new(TestPoster));

        let status = p.process(&record("1", "hello")).await;
        assert_eq!(
            status,
            ReplyStatus::Posted {
                posted_id: "simulated_1".to_string()
            }
        );
        assert_eq!(p.process(&record("1", "hello")).await, ReplyStatus::Skipped);
    }

    #[tokio::test]
    async fn ledger_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut p = processor(dir.path(), Arc::new(TestPoster));
            p.process(&record("1", "hello")).await;
        }
        let mut p = processor(dir.path(), Arc::new(TestPoster));
        assert_eq!(p.processed_count(), 1);
        assert_eq!(p.process(&record("1", "hello")).await, ReplyStatus::Skipped);
    }

    #[tokio::test]
    async fn failures_are_not_marked_processed() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = processor(dir.path(), Arc::new(FailingPoster));

        let status = p.process(&record("1", "hello")).await;
        assert!(matches!(status, ReplyStatus::Failed(_)));
        assert_eq!(p.processed_count(), 0);

        // A working poster on the next run picks the record up again.
        let mut p = processor(dir.path(), Arc::new(TestPoster));
        assert!(matches!(
            p.process(&record("1", "hello")).await,
            ReplyStatus::Posted { .. }
        ));
    }

    #[tokio::test]
    async fn empty_records_are_rejected_without_posting() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = processor(dir.path(), Arc::new(TestPoster));
        assert!(matches!(
            p.process(&record("1", "   ")).await,
            ReplyStatus::Failed(_)
        ));
    }

    #[tokio::test]
    async fn batch_reports_per_record_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = processor(dir.path(), Arc::new(TestPoster));

        let results = p
            .process_all(&[record("1", "a"), record("1", "a"), record("2", "b")])
            .await;
        assert_eq!(results.len(), 3);
        assert!(matches!(results[0].1, ReplyStatus::Posted { .. }));
        assert_eq!(results[1].1, ReplyStatus::Skipped);
        assert!(matches!(results[2].1, ReplyStatus::Posted { .. }));
    }
}
