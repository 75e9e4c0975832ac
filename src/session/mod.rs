mod cookie_file;

pub use cookie_file::CookieFile;

use anyhow::Result;
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

/// Name of the CSRF cookie the web client mirrors into `x-csrf-token`.
pub const SESSION_COOKIE: &str = "ct0";
pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieQuery {
    pub domain: String,
    pub name: String,
}

impl CookieQuery {
    pub fn new(domain: &str, name: &str) -> Self {
        Self {
            domain: domain.to_string(),
            name: name.to_string(),
        }
    }

    pub fn session(domain: &str) -> Self {
        Self::new(domain, SESSION_COOKIE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

#[async_trait]
pub trait CookieProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_cookie(&self, query: &CookieQuery) -> Result<Cookie>;
}

/// Cookies supplied directly through settings or the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticCookies {
    values: HashMap<String, String>,
}

impl StaticCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.values.insert(name.to_string(), value.to_string());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

#[async_trait]
impl CookieProvider for StaticCookies {
    fn name(&self) -> &'static str {
        "settings"
    }

    async fn fetch_cookie(&self, query: &CookieQuery) -> Result<Cookie> {
        let value = self.get(&query.name).ok_or_else(|| {
            anyhow::anyhow!(
                "Cookie {} for {} is not configured",
                query.name,
                query.domain
            )
        })?;

        Ok(Cookie {
            name: query.name.clone(),
            value: value.to_string(),
        })
    }
}

/// Asks each provider in turn and returns the first cookie found.
pub struct LayeredCookies {
    layers: Vec<Arc<dyn CookieProvider>>,
}

impl LayeredCookies {
    pub fn new(layers: Vec<Arc<dyn CookieProvider>>) -> Self {
        Self { layers }
    }
}

#[async_trait]
impl CookieProvider for LayeredCookies {
    fn name(&self) -> &'static str {
        "layered"
    }

    async fn fetch_cookie(&self, query: &CookieQuery) -> Result<Cookie> {
        let mut last_error = None;
        for layer in &self.layers {
            match layer.fetch_cookie(query).await {
                Ok(cookie) => return Ok(cookie),
                Err(e) => {
                    debug!("{} has no cookie {}: {:#}", layer.name(), query.name, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("No cookie source configured for {}", query.name)
        }))
    }
}
