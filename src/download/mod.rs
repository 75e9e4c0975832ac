mod aria2;
mod browser;
mod downloader;

pub use aria2::Aria2Client;
pub use browser::HttpDownloader;
pub use downloader::Downloader;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("unknown download backend: {0}")]
    UnknownBackend(String),
    #[error("{backend} backend cannot handle a {kind} download config")]
    WrongVariant {
        backend: &'static str,
        kind: BackendKind,
    },
    #[error("refusing to write outside the download root: {0}")]
    UnsafePath(String),
}

/// What the built-in downloader does when the destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictAction {
    /// Keep both files, numbering the new one.
    #[default]
    Uniquify,
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Browser,
    Aria2,
}

type ConfigBuilder = fn(&str, &str) -> DownloadConfig;

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::Browser, BackendKind::Aria2];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Browser => "browser",
            BackendKind::Aria2 => "aria2",
        }
    }

    /// Selects the backend from the stored "external download manager" switch.
    pub fn from_external_manager(enabled: bool) -> Self {
        if enabled {
            BackendKind::Aria2
        } else {
            BackendKind::Browser
        }
    }

    fn builder(self) -> ConfigBuilder {
        match self {
            BackendKind::Browser => BrowserDownload::build,
            BackendKind::Aria2 => Aria2Download::build,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DownloadError::UnknownBackend(s.to_string()))
    }
}

/// Request shape of the built-in downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserDownload {
    pub url: String,
    pub filename: String,
    pub conflict_action: ConflictAction,
}

impl BrowserDownload {
    fn build(url: &str, path: &str) -> DownloadConfig {
        DownloadConfig::Browser(Self {
            url: url.to_string(),
            filename: path.to_string(),
            conflict_action: ConflictAction::default(),
        })
    }
}

/// Request shape of aria2; `out` is aria2's name for the output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aria2Download {
    pub url: String,
    pub out: String,
}

impl Aria2Download {
    fn build(url: &str, path: &str) -> DownloadConfig {
        DownloadConfig::Aria2(Self {
            url: url.to_string(),
            out: path.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DownloadConfig {
    Browser(BrowserDownload),
    Aria2(Aria2Download),
}

impl DownloadConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            DownloadConfig::Browser(_) => BackendKind::Browser,
            DownloadConfig::Aria2(_) => BackendKind::Aria2,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            DownloadConfig::Browser(config) => &config.url,
            DownloadConfig::Aria2(config) => &config.url,
        }
    }

    pub fn destination(&self) -> &str {
        match self {
            DownloadConfig::Browser(config) => &config.filename,
            DownloadConfig::Aria2(config) => &config.out,
        }
    }
}

pub fn build_config(source_url: &str, path: &str, backend: BackendKind) -> DownloadConfig {
    (backend.builder())(source_url, path)
}

/// Same as [`build_config`] for a backend named by its string tag.
pub fn build_config_by_tag(
    source_url: &str,
    path: &str,
    tag: &str,
) -> Result<DownloadConfig, DownloadError> {
    Ok(build_config(source_url, path, tag.parse()?))
}
