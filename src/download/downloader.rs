use super::DownloadConfig;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Human-readable name of the backend
    fn name(&self) -> &'static str;

    /// Hand the download over to the backend and return its id for it
    async fn submit(&self, config: &DownloadConfig) -> Result<String>;

    /// Test if this backend is reachable
    async fn test_availability(&self) -> bool;
}
