use crate::session::Cookie;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Human-readable name of the source
    fn name(&self) -> &'static str;

    /// Ordered media URLs attached to the post, authenticated with the session cookie.
    /// An empty post is reported as an error.
    async fn fetch_media_list(&self, post_id: &str, session: &Cookie) -> Result<Vec<String>>;
}
