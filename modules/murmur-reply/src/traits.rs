use async_trait::async_trait;

/// Drafts reply text for a crawled post.
#[async_trait]
pub trait ReplyComposer: Send + Sync {
    async fn compose(&self, post_text: &str) -> anyhow::Result<String>;
}

/// Publishes a reply. Returns the id of the published post.
#[async_trait]
pub trait ReplyPoster: Send + Sync {
    async fn post(&self, text: &str, in_reply_to: &str) -> anyhow::Result<String>;
}
