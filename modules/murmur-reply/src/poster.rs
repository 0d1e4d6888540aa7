//! Posts replies through the platform's v2 API.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::traits::ReplyPoster;

const API_URL: &str = "https://api.twitter.com";

/// Hard platform limit, in characters not bytes.
const MAX_POST_CHARS: usize = 280;

pub struct XPoster {
    bearer_token: String,
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PostResponse {
    data: PostData,
}

#[derive(Deserialize)]
struct PostData {
    id: String,
}

impl XPoster {
    pub fn new(bearer_token: &str) -> Self {
        Self {
            bearer_token: bearer_token.to_string(),
            http: reqwest::Client::new(),
            base_url: API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}

#[async_trait]
impl ReplyPoster for XPoster {
    async fn post(&self, text: &str, in_reply_to: &str) -> Result<String> {
        let text = truncate_chars(text, MAX_POST_CHARS);
        let url = format!("{}/2/tweets", self.base_url);
        let body = json!({
            "text": text,
            "reply": { "in_reply_to_tweet_id": in_reply_to }
        });

        debug!(in_reply_to, chars = text.chars().count(), "Posting reply");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Post API error ({}): {}", status, error_text));
        }

        let posted: PostResponse = response.json().await?;
        Ok(posted.data.id)
    }
}

/// Truncate on a character boundary, never mid-codepoint.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars.saturating_sub(3)).collect::<String>() + "..."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through() {
        assert_eq!(truncate_chars("hello", 280), "hello");
    }

    #[test]
    fn long_text_is_truncated_with_ellipsis() {
        let long = "x".repeat(300);
        let out = truncate_chars(&long, 280);
        assert_eq!(out.chars().count(), 280);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn truncation_respects_multibyte_boundaries() {
        let long = "é".repeat(300);
        let out = truncate_chars(&long, 280);
        assert_eq!(out.chars().count(), 280);
    }
}
