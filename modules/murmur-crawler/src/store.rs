//! Persisted record store: JSON as the source of truth, a CSV sibling for
//! spreadsheet consumers, atomic writes via a temp file rename.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use murmur_common::Record;

pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load whatever is persisted. A missing, unreadable, or corrupt file
    /// is an empty store, never an error: the crawl must be able to start
    /// from nothing.
    pub fn load(&self) -> Vec<Record> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No existing store, starting empty");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read store");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Store is corrupt, ignoring it");
                Vec::new()
            }
        }
    }

    /// Delete the persisted file.
    pub fn reset(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Removed existing store"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Could not remove store"),
        }
    }

    /// Write the full merged set back out. The JSON write is atomic; the
    /// CSV sibling is best-effort and never fails the save.
    pub fn save(&self, records: &HashMap<String, Record>) -> anyhow::Result<usize> {
        let mut sorted: Vec<&Record> = records.values().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let json = serde_json::to_vec_pretty(&sorted).context("serializing records")?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).context("creating temp store file")?;
        tmp.write_all(&json).context("writing temp store file")?;
        tmp.persist(&self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        info!(path = %self.path.display(), count = sorted.len(), "Persisted record store");

        if let Err(e) = self.write_csv(&sorted) {
            warn!(error = %e, "CSV export failed");
        }
        Ok(sorted.len())
    }

    fn write_csv(&self, records: &[&Record]) -> anyhow::Result<()> {
        let path = self.path.with_extension("csv");
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer.write_record([
            "id",
            "url",
            "author_handle",
            "author_display_name",
            "body_text",
            "published_at",
            "replies",
            "retweets",
            "likes",
            "media",
            "reply_target_handles",
            "reply_target_id",
            "source_endpoint",
            "fetched_at",
            "page_found",
            "thread_position",
            "thread_size",
            "thread_key",
        ])?;
        for record in records {
            writer.write_record([
                record.id.clone(),
                record.url.clone(),
                record.author_handle.clone(),
                record.author_display_name.clone(),
                record.body_text.clone(),
                record.published_at.clone(),
                stat(record, "replies"),
                stat(record, "retweets"),
                stat(record, "likes"),
                record.media.as_deref().map(|m| m.join(" ")).unwrap_or_default(),
                record
                    .reply_target_handles
                    .as_deref()
                    .map(|h| h.join(" "))
                    .unwrap_or_default(),
                record.reply_target_id.clone().unwrap_or_default(),
                record.source_endpoint.clone(),
                record.fetched_at.to_rfc3339(),
                record.page_found.to_string(),
                record
                    .thread_position
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                record.thread_size.map(|s| s.to_string()).unwrap_or_default(),
                record.thread_key.clone().unwrap_or_default(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn stat(record: &Record, name: &str) -> String {
    record
        .engagement
        .get(name)
        .cloned()
        .unwrap_or_else(|| "0".to_string())
}

/// Merge fresh records over prior ones. Right-biased: when the same id
/// appears on both sides, the fresh record wins (its engagement counters
/// and thread annotations are newer).
pub fn merge(prior: Vec<Record>, fresh: &[Record]) -> HashMap<String, Record> {
    let mut merged: HashMap<String, Record> = prior
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect();
    for record in fresh {
        merged.insert(record.id.clone(), record.clone());
    }
    merged
}

pub fn seen_ids(records: &[Record]) -> HashSet<String> {
    records.iter().map(|record| record.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    #[test]
    fn merge_is_right_biased() {
        let mut old = record("1");
        old.body_text = "old".into();
        let mut new = record("1");
        new.body_text = "new".into();

        let merged = merge(vec![old], &[new]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged["1"].body_text, "new");
    }

    #[test]
    fn merge_keeps_prior_records_not_refreshed() {
        let merged = merge(vec![record("1"), record("2")], &[record("3")]);
        assert_eq!(merged.len(), 3);
        assert!(merged.contains_key("1"));
        assert!(merged.contains_key("3"));
    }

    #[test]
    fn merge_is_idempotent() {
        let fresh = [record("1"), record("2")];
        let once = merge(Vec::new(), &fresh);
        let twice = merge(once.values().cloned().collect(), &fresh);
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("posts.json"));

        let merged = merge(Vec::new(), &[record("2"), record("1")]);
        let count = store.save(&merged).unwrap();
        assert_eq!(count, 2);

        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        // saved sorted by id for stable diffs
        assert_eq!(loaded[0].id, "1");
        assert_eq!(loaded[1].id, "2");
    }

    #[test]
    fn save_writes_csv_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("posts.json"));
        store.save(&merge(Vec::new(), &[record("1")])).unwrap();

        let csv = std::fs::read_to_string(dir.path().join("posts.csv")).unwrap();
        assert!(csv.starts_with("id,url,author_handle"));
        assert!(csv.lines().count() >= 2);
    }

    #[test]
    fn corrupt_store_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(RecordStore::new(&path).load().is_empty());
    }

    #[test]
    fn missing_store_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("nope.json"));
        assert!(store.load().is_empty());
        store.reset(); // no-op on missing file
    }
}
