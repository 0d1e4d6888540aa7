use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One crawled post.
///
/// `id` is the sole deduplication key: two records sharing an id are the
/// same logical post, and the later write wins on merge. Thread fields are
/// absent until the thread reconstructor has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub url: String,
    pub author_handle: String,
    pub author_display_name: String,
    pub body_text: String,
    /// Best-effort timestamp string; format varies by mirror.
    pub published_at: String,
    /// Named engagement counters (replies, retweets, likes). Kept as strings
    /// because mirrors render abbreviated counts like "1,2K".
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub engagement: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<String>>,
    /// Handles this record replies to. Absent for standalone posts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_target_handles: Option<Vec<String>>,
    /// Upstream record id, when a parent permalink was resolvable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_target_id: Option<String>,
    /// Mirror endpoint that produced this record.
    pub source_endpoint: String,
    pub fetched_at: DateTime<Utc>,
    pub page_found: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_key: Option<String>,
}

impl Record {
    pub fn is_reply(&self) -> bool {
        self.reply_target_handles
            .as_ref()
            .is_some_and(|handles| !handles.is_empty())
    }
}
