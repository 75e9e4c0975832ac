//! Settings layout written by 1.1.6 and earlier: a flat document with the
//! aria2 switch stored next to the filename rules.

use super::{FilenamePattern, Settings, CURRENT_VERSION};
use anyhow::{Context, Result};
use serde::Deserialize;

/// The last release that wrote the flat layout.
pub const LEGACY_VERSION: &str = "1.1.6";

/// Top-level keys that only the flat layout uses.
const LEGACY_KEYS: [&str; 3] = ["directory", "filename_pattern", "enable_aria2"];

#[derive(Debug, Deserialize)]
struct LegacySettings {
    directory: Option<String>,
    filename_pattern: Option<FilenamePattern>,
    enable_aria2: Option<bool>,
}

/// Returns the migrated settings, or `None` if `data` has no flat-layout keys.
/// Sections already written in the current layout are carried over.
pub(super) fn migrate(data: &str) -> Result<Option<Settings>> {
    let table: toml::Table = toml::from_str(data).context("Failed to parse settings")?;
    if !LEGACY_KEYS.iter().any(|key| table.contains_key(*key)) {
        return Ok(None);
    }

    let document = toml::Value::Table(table);
    let legacy: LegacySettings = document
        .clone()
        .try_into()
        .context("Failed to read the legacy settings keys")?;
    let mut settings: Settings = document
        .try_into()
        .context("Failed to read the current settings sections")?;

    if let Some(directory) = legacy.directory {
        settings.filename.directory = directory;
    }
    if let Some(pattern) = legacy.filename_pattern {
        settings.filename.filename_pattern = pattern;
    }
    if let Some(enabled) = legacy.enable_aria2 {
        settings.aria2.enabled = enabled;
    }
    settings.version = CURRENT_VERSION.to_string();

    Ok(Some(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SerialMode;

    #[test]
    fn test_current_layout_is_left_alone() {
        let current = toml::to_string_pretty(&Settings::default()).unwrap();
        assert!(migrate(&current).unwrap().is_none());
    }

    #[test]
    fn test_missing_legacy_fields_take_defaults() {
        let settings = migrate("directory = \"pics\"\n").unwrap().unwrap();
        assert_eq!(settings.filename.directory, "pics");
        assert_eq!(settings.filename.filename_pattern, FilenamePattern::default());
        assert!(!settings.aria2.enabled);
    }

    #[test]
    fn test_legacy_pattern_is_kept() {
        let settings = migrate("[filename_pattern]\naccount = true\nserial = \"file_name\"\n")
            .unwrap()
            .unwrap();
        assert_eq!(settings.filename.filename_pattern.serial, SerialMode::FileName);
        assert_eq!(settings.filename.directory, "twitter_media");
    }

    #[test]
    fn test_current_sections_without_filename_are_left_alone() {
        assert!(migrate("[aria2]\nenabled = true\n").unwrap().is_none());
        assert!(migrate("").unwrap().is_none());
    }

    #[test]
    fn test_current_sections_survive_migration() {
        let settings = migrate(
            "directory = \"old\"\n\n[aria2]\nenabled = true\nsecret = \"s3cret\"\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(settings.filename.directory, "old");
        assert!(settings.aria2.enabled);
        assert_eq!(settings.aria2.secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_broken_document_is_an_error() {
        assert!(migrate("directory = [").is_err());
    }
}
