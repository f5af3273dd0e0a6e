//! Standard paths used by devrunner

use std::path::{Path, PathBuf};

/// File name of the per-project config, looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = ".devrunner.toml";

/// Standard devrunner paths
#[derive(Debug, Clone)]
pub struct Paths {
    /// Config directory (~/.config/devrunner)
    pub config: PathBuf,
    /// Data directory (~/.local/share/devrunner)
    pub data: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("devrunner");

        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("devrunner");

        Self { config, data }
    }

    /// Root every path under `root` (used by tests and sandboxed runs)
    pub fn with_root(root: &Path) -> Self {
        Self {
            config: root.join("config"),
            data: root.join("data"),
        }
    }

    /// Global config file
    pub fn global_config(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Project config file for a working directory
    pub fn local_config(dir: &Path) -> PathBuf {
        dir.join(LOCAL_CONFIG_FILE)
    }

    /// Record left behind by a successful self-update
    pub fn update_state(&self) -> PathBuf {
        self.data.join("update-state.json")
    }

    /// Timestamp of the last background update check
    pub fn last_update_check(&self) -> PathBuf {
        self.data.join("last-check")
    }
}
