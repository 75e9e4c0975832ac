use super::{downloader::Downloader, DownloadConfig, DownloadError};
use crate::config::Aria2Settings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

const RPC_ID: &str = "tweetgrab";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// External download manager reached through aria2's JSON-RPC interface.
pub struct Aria2Client {
    client: reqwest::Client,
    rpc_url: String,
    secret: Option<String>,
    dir: Option<String>,
}

impl Aria2Client {
    pub fn new(settings: &Aria2Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            rpc_url: settings.rpc_url.clone(),
            secret: settings.secret.clone(),
            dir: settings.dir.clone(),
        })
    }

    /// Prepends the `token:` parameter when an RPC secret is configured.
    fn params(&self, rest: impl IntoIterator<Item = Value>) -> Vec<Value> {
        self.secret
            .iter()
            .map(|secret| Value::String(format!("token:{secret}")))
            .chain(rest)
            .collect()
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: RPC_ID,
            method,
            params,
        };
        debug!("aria2 call {} at {}", method, self.rpc_url);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach aria2 at {}", self.rpc_url))?;

        let status = response.status();
        let body: RpcResponse = response
            .json()
            .await
            .with_context(|| format!("Invalid aria2 response (HTTP {status})"))?;

        if let Some(error) = body.error {
            return Err(anyhow::anyhow!(
                "aria2 {} failed ({}): {}",
                method,
                error.code,
                error.message
            ));
        }

        body.result
            .ok_or_else(|| anyhow::anyhow!("aria2 {} returned no result", method))
    }
}

#[async_trait]
impl Downloader for Aria2Client {
    fn name(&self) -> &'static str {
        "aria2"
    }

    async fn submit(&self, config: &DownloadConfig) -> Result<String> {
        let DownloadConfig::Aria2(request) = config else {
            return Err(DownloadError::WrongVariant {
                backend: self.name(),
                kind: config.kind(),
            }
            .into());
        };

        let mut options = Map::new();
        options.insert("out".to_string(), Value::String(request.out.clone()));
        if let Some(dir) = &self.dir {
            options.insert("dir".to_string(), Value::String(dir.clone()));
        }

        let params = self.params([json!([request.url]), Value::Object(options)]);
        let gid = self.call("aria2.addUri", params).await?;
        let gid = gid
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("aria2 returned a non-string gid: {}", gid))?
            .to_string();

        info!("Queued {} in aria2 as {}", request.out, gid);
        Ok(gid)
    }

    async fn test_availability(&self) -> bool {
        match self.call("aria2.getVersion", self.params([])).await {
            Ok(version) => {
                info!(
                    "✅ aria2 is available, version: {}",
                    version["version"].as_str().unwrap_or("unknown")
                );
                true
            }
            Err(e) => {
                warn!("❌ aria2 not reachable: {}", e);
                false
            }
        }
    }
}
