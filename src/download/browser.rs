use super::{downloader::Downloader, ConflictAction, DownloadConfig, DownloadError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{
    io,
    path::{Component, Path, PathBuf},
};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Built-in downloader: fetches the media itself and writes it under `root`.
pub struct HttpDownloader {
    client: reqwest::Client,
    root: PathBuf,
    conflict_action: Option<ConflictAction>,
}

impl HttpDownloader {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            root: root.into(),
            conflict_action: None,
        })
    }

    /// Use `action` for every download instead of the one in the request.
    pub fn with_conflict_action(mut self, action: ConflictAction) -> Self {
        self.conflict_action = Some(action);
        self
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf, DownloadError> {
        let relative = Path::new(filename);
        let is_safe = relative.components().next().is_some()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !is_safe {
            return Err(DownloadError::UnsafePath(filename.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Streams `url` into a hidden temporary file in `dir`. The temporary file
    /// is deleted when dropped, so an early return leaves nothing behind.
    async fn fetch_to_temp(&self, url: &str, dir: &Path) -> Result<(NamedTempFile, u64)> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to fetch media URL")?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to download media: HTTP {}",
                response.status()
            ));
        }

        let temp = tempfile::Builder::new()
            .prefix(".tweetgrab-")
            .suffix(".part")
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
        let mut file = tokio::fs::File::from_std(
            temp.reopen()
                .with_context(|| format!("Failed to open {}", temp.path().display()))?,
        );

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read media data")?
        {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", temp.path().display()))?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok((temp, written))
    }
}

/// Moves a finished download over `target`, replacing any file there.
fn replace(temp: NamedTempFile, target: PathBuf) -> Result<PathBuf> {
    temp.persist(&target)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move download to {}", target.display()))?;
    Ok(target)
}

/// Moves a finished download to `target`, or to the first free `name (n).ext`
/// next to it. Each move fails instead of replacing an existing file, so two
/// tasks can never end up with the same name.
fn claim_free_name(mut temp: NamedTempFile, target: PathBuf) -> Result<PathBuf> {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for n in 0..=u32::MAX {
        let candidate = match n {
            0 => target.clone(),
            n => target.with_file_name(format!("{stem} ({n}){ext}")),
        };
        match temp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => temp = e.file,
            Err(e) => {
                return Err(anyhow::Error::new(e.error)
                    .context(format!("Failed to move download to {}", candidate.display())))
            }
        }
    }
    Err(anyhow::anyhow!("No free file name for {}", target.display()))
}

#[async_trait]
impl Downloader for HttpDownloader {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn submit(&self, config: &DownloadConfig) -> Result<String> {
        let DownloadConfig::Browser(request) = config else {
            return Err(DownloadError::WrongVariant {
                backend: self.name(),
                kind: config.kind(),
            }
            .into());
        };

        let target = self.resolve(&request.filename)?;
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        debug!("Downloading {} to {}", request.url, target.display());
        let (temp, bytes) = self.fetch_to_temp(&request.url, &dir).await?;

        let target = match self.conflict_action.unwrap_or(request.conflict_action) {
            ConflictAction::Uniquify => claim_free_name(temp, target)?,
            ConflictAction::Overwrite => replace(temp, target)?,
        };

        info!("Saved {} ({} bytes)", target.display(), bytes);
        Ok(target.display().to_string())
    }

    async fn test_availability(&self) -> bool {
        match tokio::fs::create_dir_all(&self.root).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Download root {} is not usable: {}", self.root.display(), e);
                false
            }
        }
    }
}
