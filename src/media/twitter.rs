use super::source::MediaSource;
use crate::{
    config::TwitterSettings,
    session::{Cookie, AUTH_COOKIE, SESSION_COOKIE},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, COOKIE};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

/// Bearer token of the public web client.
pub const DEFAULT_BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

pub struct TwitterApi {
    client: reqwest::Client,
    api_base: String,
    bearer_token: String,
    auth_token: Option<String>,
}

impl TwitterApi {
    pub fn new(settings: &TwitterSettings, auth_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            bearer_token: settings
                .bearer_token
                .clone()
                .unwrap_or_else(|| DEFAULT_BEARER_TOKEN.to_string()),
            auth_token,
        })
    }

    fn show_url(&self, post_id: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/1.1/statuses/show.json", self.api_base))
            .with_context(|| format!("Invalid API base {}", self.api_base))?;
        url.query_pairs_mut()
            .append_pair("id", post_id)
            .append_pair("tweet_mode", "extended")
            .append_pair("include_entities", "true");
        Ok(url)
    }

    fn cookie_header(&self, session: &Cookie) -> String {
        match &self.auth_token {
            Some(token) => format!(
                "{SESSION_COOKIE}={}; {AUTH_COOKIE}={token}",
                session.value
            ),
            None => format!("{SESSION_COOKIE}={}", session.value),
        }
    }
}

/// Picks the downloadable URL of every media entity, in post order.
///
/// Photos use `media_url_https`; videos and GIFs use the highest-bitrate MP4 variant.
fn extract_media_urls(tweet: &Value) -> Vec<String> {
    let media = tweet["extended_entities"]["media"]
        .as_array()
        .or_else(|| tweet["entities"]["media"].as_array());

    let Some(media) = media else {
        return Vec::new();
    };

    media
        .iter()
        .filter_map(|item| match item["type"].as_str() {
            Some("video") | Some("animated_gif") => best_video_variant(item),
            _ => item["media_url_https"]
                .as_str()
                .or(item["media_url"].as_str())
                .map(str::to_string),
        })
        .collect()
}

fn best_video_variant(item: &Value) -> Option<String> {
    item["video_info"]["variants"]
        .as_array()?
        .iter()
        .filter(|variant| variant["content_type"].as_str() == Some("video/mp4"))
        .max_by_key(|variant| variant["bitrate"].as_u64().unwrap_or(0))
        .and_then(|variant| variant["url"].as_str())
        .map(str::to_string)
}

#[async_trait]
impl MediaSource for TwitterApi {
    fn name(&self) -> &'static str {
        "twitter-api"
    }

    async fn fetch_media_list(&self, post_id: &str, session: &Cookie) -> Result<Vec<String>> {
        let url = self.show_url(post_id)?;
        debug!("Fetching media list: {}", url);

        let mut request = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.bearer_token))
            .header("x-csrf-token", &session.value)
            .header("x-twitter-active-user", "yes")
            .header(COOKIE, self.cookie_header(session));
        if self.auth_token.is_some() {
            request = request.header("x-twitter-auth-type", "OAuth2Session");
        }

        let response = request
            .send()
            .await
            .context("Failed to fetch post metadata")?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to fetch post {}: HTTP {}",
                post_id,
                response.status()
            ));
        }

        let tweet: Value = response
            .json()
            .await
            .context("Failed to parse post metadata")?;

        let urls = extract_media_urls(&tweet);
        if urls.is_empty() {
            return Err(anyhow::anyhow!("No media found in post {}", post_id));
        }

        info!("Found {} media items in post {}", urls.len(), post_id);
        Ok(urls)
    }
}
