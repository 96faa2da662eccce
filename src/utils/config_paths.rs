//! Configuration paths
//!
//! pman keeps an optional user configuration in `~/.pman/config.json`.
//! A missing or unreadable file simply means built-in defaults.

use crate::config::{CONFIG_DIR, CONFIG_FILE};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// User configuration (read from config.json)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserConfig {
    /// Prompt shown before each command
    #[serde(default)]
    pub prompt: Option<String>,
    /// Root of the procfs tree used for stats (supports `~` expansion)
    #[serde(default)]
    pub proc_root: Option<String>,
    /// Number of commands kept in the line history
    #[serde(default)]
    pub history_limit: Option<usize>,
    #[serde(default)]
    pub log_level: Option<String>,
    /// Log file path (supports `~` expansion)
    #[serde(default)]
    pub log_file: Option<String>,
}

impl UserConfig {
    /// Load from `config_file`, falling back to defaults
    pub fn load(config_file: &Path) -> Self {
        if !config_file.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(config_file) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(err) => {
                    debug!("Ignoring invalid config {}: {}", config_file.display(), err);
                    Self::default()
                }
            },
            Err(err) => {
                debug!("Cannot read config {}: {}", config_file.display(), err);
                Self::default()
            }
        }
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Configuration file locations
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Persistent configuration directory (~/.pman/)
    pub config_dir: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub user_config: UserConfig,
}

impl ConfigPaths {
    pub fn new() -> Result<Self> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?;
        let config_dir = home_dir.join(CONFIG_DIR);
        let config_file = config_dir.join(CONFIG_FILE);
        let user_config = UserConfig::load(&config_file);

        Ok(Self {
            config_dir: Some(config_dir),
            config_file: Some(config_file),
            user_config,
        })
    }

    /// Use an explicit config file instead of the one in the home directory
    pub fn with_config_file(config_file: PathBuf) -> Self {
        let user_config = UserConfig::load(&config_file);
        Self {
            config_dir: config_file.parent().map(Path::to_path_buf),
            config_file: Some(config_file),
            user_config,
        }
    }

    /// No configuration file at all
    pub fn detached() -> Self {
        Self {
            config_dir: None,
            config_file: None,
            user_config: UserConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = UserConfig::load(&dir.path().join("config.json"));
        assert_eq!(config, UserConfig::default());
    }

    #[test]
    fn test_load_partial_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"prompt": "jobs", "history_limit": 5}"#).unwrap();

        let paths = ConfigPaths::with_config_file(path);
        assert_eq!(paths.user_config.prompt.as_deref(), Some("jobs"));
        assert_eq!(paths.user_config.history_limit, Some(5));
        assert_eq!(paths.user_config.proc_root, None);
        assert_eq!(paths.config_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_load_invalid_json_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(UserConfig::load(&path), UserConfig::default());
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/proc"), PathBuf::from("/proc"));
    }
}
