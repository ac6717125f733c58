// src/infra/paths.rs — Config and data path management
//
// All paths respect the CHARTSMITH_HOME environment variable for isolation.
// When CHARTSMITH_HOME is set, config and data live under that directory.
// When unset, config uses ~/.chartsmith/ and data uses XDG_DATA_HOME/chartsmith.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Returns the CHARTSMITH_HOME override, if set.
fn chartsmith_home() -> Option<PathBuf> {
    std::env::var_os("CHARTSMITH_HOME").map(PathBuf::from)
}

/// Home directory, falling back to the working directory on exotic platforms.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $CHARTSMITH_HOME/ or ~/.chartsmith/
pub fn config_dir() -> PathBuf {
    if let Some(home) = chartsmith_home() {
        return home;
    }
    dirs_home().join(".chartsmith")
}

/// Data directory: $CHARTSMITH_HOME/data/ or ~/.local/share/chartsmith/
pub fn data_dir() -> PathBuf {
    if let Some(home) = chartsmith_home() {
        return home.join("data");
    }
    ProjectDirs::from("", "", "chartsmith")
        .map(|d| d.data_local_dir().to_path_buf())
        .unwrap_or_else(|| config_dir().join("data"))
}

/// Cache database path
pub fn db_path() -> PathBuf {
    data_dir().join("chartsmith.db")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure the data directory exists
pub fn ensure_data_dir() -> std::io::Result<PathBuf> {
    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
