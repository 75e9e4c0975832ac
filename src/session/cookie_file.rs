use super::{Cookie, CookieProvider, CookieQuery};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::debug;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Debug, Clone, PartialEq, Eq)]
struct CookieEntry {
    domain: String,
    include_subdomains: bool,
    expires: u64,
    name: String,
    value: String,
}

impl CookieEntry {
    fn parse(line: &str) -> Option<Self> {
        let line = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => rest,
            None if line.starts_with('#') => return None,
            None => line,
        };

        let fields: Vec<&str> = line.split('\t').collect();
        let [domain, include_subdomains, _path, _secure, expires, name, value] = fields.as_slice()
        else {
            return None;
        };

        Some(Self {
            domain: domain.trim_start_matches('.').to_ascii_lowercase(),
            include_subdomains: include_subdomains.eq_ignore_ascii_case("TRUE")
                || domain.starts_with('.'),
            expires: expires.parse().unwrap_or(0),
            name: name.to_string(),
            value: value.trim_end_matches('\r').to_string(),
        })
    }

    fn matches_domain(&self, domain: &str) -> bool {
        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        if domain == self.domain {
            return true;
        }
        // A cookie set for `twitter.com` is also sent to `api.twitter.com`.
        self.include_subdomains && domain.ends_with(&format!(".{}", self.domain))
    }

    fn is_expired(&self, now: u64) -> bool {
        self.expires != 0 && self.expires <= now
    }
}

fn parse_cookies(data: &str) -> Vec<CookieEntry> {
    data.lines()
        .map(str::trim_start)
        .filter(|line| !line.is_empty())
        .filter_map(CookieEntry::parse)
        .collect()
}

fn find_cookie(data: &str, query: &CookieQuery, now: u64) -> Option<Cookie> {
    parse_cookies(data)
        .into_iter()
        .filter(|entry| entry.name == query.name)
        .filter(|entry| entry.matches_domain(&query.domain))
        .filter(|entry| !entry.is_expired(now))
        .last()
        .map(|entry| Cookie {
            name: entry.name,
            value: entry.value,
        })
}

/// Cookie store exported from a browser in the Netscape `cookies.txt` format.
///
/// The file is re-read on every lookup so a fresh export is picked up
/// without restarting.
#[derive(Debug, Clone)]
pub struct CookieFile {
    path: PathBuf,
}

impl CookieFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CookieProvider for CookieFile {
    fn name(&self) -> &'static str {
        "cookies.txt"
    }

    async fn fetch_cookie(&self, query: &CookieQuery) -> Result<Cookie> {
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read cookies from {}", self.path.display()))?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        debug!("Looking up cookie {} for {}", query.name, query.domain);
        find_cookie(&data, query, now).ok_or_else(|| {
            anyhow::anyhow!(
                "Cookie {} for {} not found in {}",
                query.name,
                query.domain,
                self.path.display()
            )
        })
    }
}
