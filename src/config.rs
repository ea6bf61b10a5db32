//! Configuration management for runpane.
//!
//! Loads defaults from `~/.runpane/config.toml`; command line flags always
//! win over the file.
//!
//! # Configuration File
//!
//! ```toml
//! # Seconds before the console closes itself after the child exits.
//! # Negative means never: wait for a manual quit.
//! timeout_secs = 15
//!
//! # Always wait for a manual quit, regardless of timeout_secs
//! wait_on_finish = false
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::controller::CloseBehavior;

/// Default countdown before the console closes itself.
pub const DEFAULT_TIMEOUT_SECS: i64 = 15;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Auto-close countdown in seconds; negative disables auto-close
    pub timeout_secs: i64,
    /// Force manual dismissal regardless of the timeout
    pub wait_on_finish: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            wait_on_finish: false,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults.
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(config) = toml::from_str(&content) {
                        return config;
                    }
                    tracing::warn!("ignoring malformed config at {}", path.display());
                }
            }
        }
        Self::default()
    }

    /// Resolve the timeout and wait flag into a close behavior.
    pub fn close_behavior(&self) -> CloseBehavior {
        if self.wait_on_finish || self.timeout_secs < 0 {
            CloseBehavior::WaitForDismiss
        } else {
            CloseBehavior::AutoClose(Duration::from_secs(self.timeout_secs as u64))
        }
    }

    /// Config file path: `~/.runpane/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".runpane").join("config.toml"))
    }
}

/// Home directory from the environment.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(!config.wait_on_finish);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str("timeout_secs = 3").unwrap();
        assert_eq!(config.timeout_secs, 3);
        assert!(!config.wait_on_finish);
    }

    #[test]
    fn test_close_behavior_resolution() {
        let config = Config {
            timeout_secs: 3,
            wait_on_finish: false,
        };
        assert_eq!(
            config.close_behavior(),
            CloseBehavior::AutoClose(Duration::from_secs(3))
        );

        let config = Config {
            timeout_secs: -1,
            wait_on_finish: false,
        };
        assert_eq!(config.close_behavior(), CloseBehavior::WaitForDismiss);

        let config = Config {
            timeout_secs: 3,
            wait_on_finish: true,
        };
        assert_eq!(config.close_behavior(), CloseBehavior::WaitForDismiss);
    }

    #[test]
    fn test_zero_timeout_is_auto_close() {
        let config: Config = toml::from_str("timeout_secs = 0").unwrap();
        assert_eq!(
            config.close_behavior(),
            CloseBehavior::AutoClose(Duration::from_secs(0))
        );
    }
}
