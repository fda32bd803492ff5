// src/infra/paths.rs - Config and data path management
//
// All paths respect the CAIGENTAN_HOME environment variable for isolation.
// When CAIGENTAN_HOME is set, config and data live under that directory.
// When unset, config uses ~/.caigentan/ and data uses XDG_DATA_HOME/caigentan.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Returns the CAIGENTAN_HOME override, if set.
fn caigentan_home() -> Option<PathBuf> {
    std::env::var_os("CAIGENTAN_HOME").map(PathBuf::from)
}

/// Home directory, or the working directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $CAIGENTAN_HOME/ or ~/.caigentan/
pub fn config_dir() -> PathBuf {
    if let Some(home) = caigentan_home() {
        return home;
    }
    dirs_home().join(".caigentan")
}

/// Data directory: $CAIGENTAN_HOME/data/ or ~/.local/share/caigentan/
pub fn data_dir() -> PathBuf {
    if let Some(home) = caigentan_home() {
        return home.join("data");
    }
    match ProjectDirs::from("", "", "caigentan") {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Client-side key-value blob (the "local storage" preferences are staged into).
pub fn local_storage_path() -> PathBuf {
    data_dir().join("local_storage.json")
}

/// Server-side chat history log.
pub fn chat_history_path() -> PathBuf {
    data_dir().join("chat_history.json")
}

/// Server-side copy of uploaded preferences.
pub fn server_preferences_path() -> PathBuf {
    data_dir().join("user_preferences.json")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), data_dir()] {
        tokio::fs::create_dir_all(&dir).await?;
    }
    Ok(())
}
