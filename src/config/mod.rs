mod legacy;

pub use legacy::LEGACY_VERSION;

use crate::download::ConflictAction;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CONFIG_ENV: &str = "TWEETGRAB_CONFIG";
pub const CT0_ENV: &str = "TWEETGRAB_CT0";
pub const AUTH_TOKEN_ENV: &str = "TWEETGRAB_AUTH_TOKEN";

/// How attachments of the same post are told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SerialMode {
    /// Position of the attachment in the post, zero-padded to two digits.
    #[default]
    Order,
    /// The attachment's own file name on the media CDN.
    FileName,
}

impl From<String> for SerialMode {
    // Unrecognized values fall back to `order`.
    fn from(value: String) -> Self {
        match value.as_str() {
            "file_name" => SerialMode::FileName,
            _ => SerialMode::Order,
        }
    }
}

impl From<SerialMode> for String {
    fn from(mode: SerialMode) -> Self {
        match mode {
            SerialMode::Order => "order".to_string(),
            SerialMode::FileName => "file_name".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilenamePattern {
    /// Prefix the file name with the account handle.
    pub account: bool,
    pub serial: SerialMode,
}

impl Default for FilenamePattern {
    fn default() -> Self {
        Self {
            account: true,
            serial: SerialMode::Order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilenameSetting {
    pub directory: String,
    pub filename_pattern: FilenamePattern,
}

impl Default for FilenameSetting {
    fn default() -> Self {
        Self {
            directory: "twitter_media".to_string(),
            filename_pattern: FilenamePattern::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Aria2Settings {
    /// Route downloads to aria2 instead of the built-in downloader.
    pub enabled: bool,
    pub rpc_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Default for Aria2Settings {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: "http://localhost:6800/jsonrpc".to_string(),
            secret: None,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Root the built-in downloader resolves paths against. Defaults to the
    /// platform download directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_root: Option<PathBuf>,
    pub conflict_action: ConflictAction,
}

impl BrowserSettings {
    pub fn resolve_download_root(&self) -> PathBuf {
        self.download_root
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Domain the session cookie is looked up for.
    pub domain: String,
    /// Netscape-format cookie export. Environment overrides win over it,
    /// and it wins over the inline values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            domain: "twitter.com".to_string(),
            cookies_file: None,
            ct0: None,
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterSettings {
    pub api_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

impl Default for TwitterSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.twitter.com".to_string(),
            bearer_token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: String,
    pub filename: FilenameSetting,
    pub aria2: Aria2Settings,
    pub browser: BrowserSettings,
    pub session: SessionSettings,
    pub twitter: TwitterSettings,
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            filename: FilenameSetting::default(),
            aria2: Aria2Settings::default(),
            browser: BrowserSettings::default(),
            session: SessionSettings::default(),
            twitter: TwitterSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Source of the filename setting snapshot taken once per dispatch.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn fetch_file_name_setting(&self) -> Result<FilenameSetting>;
}

/// Settings persisted as a single TOML document.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Picks the settings file: explicit path, then `TWEETGRAB_CONFIG`, then
    /// the platform config directory.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(Self::new(path));
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(Self::new(config_dir.join("tweetgrab").join("config.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the settings, falling back to defaults when no file exists yet.
    pub fn load(&self) -> Result<Settings> {
        if !self.exists() {
            debug!("No settings at {}, using defaults", self.path.display());
            return Ok(Settings::default());
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        toml::from_str(&data)
            .with_context(|| format!("Failed to parse settings in {}", self.path.display()))
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = toml::to_string_pretty(settings).context("Failed to serialize settings")?;
        fs::write(&self.path, data)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    /// Writes default settings on first install. An existing file is kept.
    pub fn init_storage(&self) -> Result<bool> {
        if self.exists() {
            info!("Settings already present at {}", self.path.display());
            return Ok(false);
        }

        self.save(&Settings::default())?;
        info!("Created default settings at {}", self.path.display());
        Ok(true)
    }

    /// Rewrites a settings file from the flat pre-2.0 layout into the current one.
    pub fn migrate_storage(&self) -> Result<()> {
        if !self.exists() {
            info!("Nothing to migrate, initializing settings instead");
            self.init_storage()?;
            return Ok(());
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        match legacy::migrate(&data)? {
            Some(settings) => {
                self.save(&settings)?;
                info!("Migrated settings at {}", self.path.display());
            }
            None => debug!("Settings at {} are already current", self.path.display()),
        }
        Ok(())
    }

    pub fn fetch_file_name_setting(&self) -> Result<FilenameSetting> {
        Ok(self.load()?.filename)
    }
}

#[async_trait]
impl SettingsSource for SettingsStore {
    async fn fetch_file_name_setting(&self) -> Result<FilenameSetting> {
        SettingsStore::fetch_file_name_setting(self)
    }
}
