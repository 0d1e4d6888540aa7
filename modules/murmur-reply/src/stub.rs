//! Offline composer and poster used by `--test-mode` and by tests.
//! Nothing here talks to the network.

use async_trait::async_trait;
use tracing::info;

use crate::traits::{ReplyComposer, ReplyPoster};

pub struct TestComposer;

#[async_trait]
impl ReplyComposer for TestComposer {
    async fn compose(&self, post_text: &str) -> anyhow::Result<String> {
        let preview: String = post_text.chars().take(50).collect();
        Ok(format!("TEST RESPONSE to: {preview}..."))
    }
}

pub struct TestPoster;

#[async_trait]
impl ReplyPoster for TestPoster {
    async fn post(&self, text: &str, in_reply_to: &str) -> anyhow::Result<String> {
        info!(in_reply_to, text, "Simulated post (test mode)");
        Ok(format!("simulated_{in_reply_to}"))
    }
}
