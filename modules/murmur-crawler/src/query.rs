//! Search query assembly for mirror endpoints.

use chrono::{Duration, Utc};

/// What to search for. At least one of the three parts must be set.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub from_user: Option<String>,
    /// Restrict results to the last N days.
    pub since_days: i64,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            keyword: None,
            location: None,
            from_user: None,
            since_days: 30,
        }
    }
}

impl SearchQuery {
    pub fn keyword(keyword: &str) -> Self {
        Self {
            keyword: Some(keyword.to_string()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms().is_empty()
    }

    /// Space-joined query terms, e.g. `easter Africa from:someuser`.
    pub fn terms(&self) -> String {
        let mut parts = Vec::new();
        if let Some(keyword) = self.keyword.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(keyword.trim().to_string());
        }
        if let Some(location) = self.location.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(location.trim().to_string());
        }
        if let Some(user) = self.from_user.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(format!("from:{}", user.trim().trim_start_matches('@')));
        }
        parts.join(" ")
    }

    /// The full search URL on one mirror endpoint.
    pub fn url_for(&self, endpoint: &str) -> String {
        let encoded = self.terms().replace(' ', "+");
        let since = (Utc::now() - Duration::days(self.since_days)).format("%Y-%m-%d");
        format!(
            "{}/search?f=tweets&q={}&since={}",
            endpoint.trim_end_matches('/'),
            encoded,
            since
        )
    }
}
