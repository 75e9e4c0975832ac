use super::url::{file_parts, normalize_url, upgrade_quality};
use std::{fmt, str::FromStr};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid media URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid post reference: {0}")]
    InvalidPostReference(String),
}

/// The post a download request refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReference {
    pub account_handle: String,
    pub post_id: String,
}

impl PostReference {
    pub fn new(account_handle: &str, post_id: &str) -> Result<Self, MediaError> {
        if account_handle.is_empty() || post_id.is_empty() {
            return Err(MediaError::InvalidPostReference(format!(
                "{account_handle}/{post_id}"
            )));
        }
        if !post_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MediaError::InvalidPostReference(format!(
                "post id must be numeric, got {post_id}"
            )));
        }

        Ok(Self {
            account_handle: account_handle.to_string(),
            post_id: post_id.to_string(),
        })
    }

    fn from_url(url: &Url) -> Result<Self, MediaError> {
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [handle, "status" | "statuses", id, ..] => Self::new(handle, id),
            _ => Err(MediaError::InvalidPostReference(url.to_string())),
        }
    }
}

impl FromStr for PostReference {
    type Err = MediaError;

    /// Accepts a post URL (`https://x.com/<handle>/status/<id>`) or `<handle>/<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("http://") || s.starts_with("https://") {
            let url = Url::parse(s).map_err(|_| MediaError::InvalidPostReference(s.to_string()))?;
            return Self::from_url(&url);
        }

        match s.split_once('/') {
            Some((handle, id)) => Self::new(handle, id.trim_end_matches('/')),
            None => Err(MediaError::InvalidPostReference(s.to_string())),
        }
    }
}

impl fmt::Display for PostReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_handle, self.post_id)
    }
}

/// One media attachment of a post, with every URL-derived field computed up front.
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    pub account_handle: String,
    pub post_id: String,
    pub raw_url: String,
    pub ordinal_index: usize,
    normalized_url: String,
    source_url: String,
    file_extension: String,
    base_name: String,
}

impl MediaDescriptor {
    pub fn new(post: &PostReference, raw_url: &str, ordinal_index: usize) -> Result<Self, MediaError> {
        let normalized = normalize_url(raw_url)?;
        let (base_name, file_extension) = file_parts(&normalized);
        let (base_name, file_extension) = (base_name.to_string(), file_extension.to_string());
        let normalized_url = String::from(normalized);
        let source_url = upgrade_quality(&normalized_url);

        Ok(Self {
            account_handle: post.account_handle.clone(),
            post_id: post.post_id.clone(),
            raw_url: raw_url.to_string(),
            ordinal_index,
            normalized_url,
            source_url,
            file_extension,
            base_name,
        })
    }

    pub fn normalized_url(&self) -> &str {
        &self.normalized_url
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn display_order(&self) -> String {
        (self.ordinal_index + 1).to_string()
    }
}
