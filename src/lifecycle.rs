use crate::config::{Settings, SettingsStore, LEGACY_VERSION};
use anyhow::Result;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update { previous_version: String },
}

/// Install/update hook. Returns the settings to show afterwards.
pub fn on_installed(
    store: &SettingsStore,
    reason: &InstallReason,
    current_version: &str,
) -> Result<Settings> {
    match reason {
        InstallReason::Install => {
            store.init_storage()?;
        }
        InstallReason::Update { previous_version } => {
            if previous_version == LEGACY_VERSION {
                store.migrate_storage()?;
            }
            info!("Previous version: {}", previous_version);
            info!("Current version: {}", current_version);
            info!("tweetgrab has been updated.");
        }
    }

    store.load()
}
