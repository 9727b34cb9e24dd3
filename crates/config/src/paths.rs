//! Default locations for the credentials document.

use std::path::PathBuf;

const CONFIG_FILENAME: &str = "stashpost.json";

/// The stashpost config directory (`~/.config/stashpost` or the
/// platform equivalent).
#[must_use]
pub fn config_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "stashpost")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".config/stashpost"))
}

/// Where to find the credentials document.
///
/// A project-local `stashpost.json` wins over the user config dir.
#[must_use]
pub fn discover_credentials_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return local;
    }
    config_dir().join(CONFIG_FILENAME)
}
