//! Installer configuration.
//!
//! Everything has a default, so an empty JSON object (or no file at all) is a
//! valid configuration. Example:
//!
//! ```json
//! {
//!   "security_level": "strict",
//!   "command_timeout_secs": 900,
//!   "registration_fatal": true
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::download::DEFAULT_TRUSTED_HOSTS;
use crate::installer::AppConfig;
use crate::security::SecurityLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub security_level: SecurityLevel,
    /// Upper bound for a single command, including password prompts.
    pub command_timeout_secs: u64,
    /// How long to wait for a password reply before abandoning the prompt.
    pub password_timeout_secs: u64,
    pub download_max_bytes: u64,
    pub download_timeout_secs: u64,
    /// Fail the application when it cannot be recorded as installed.
    pub registration_fatal: bool,
    pub trusted_script_hosts: Vec<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::Moderate,
            command_timeout_secs: 600,
            password_timeout_secs: 120,
            download_max_bytes: 5 * 1024 * 1024,
            download_timeout_secs: 30,
            registration_fatal: false,
            trusted_script_hosts: DEFAULT_TRUSTED_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl InstallerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config JSON at {}", path.display()))?;
        Ok(config)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn password_timeout(&self) -> Duration {
        Duration::from_secs(self.password_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// The list of applications to install, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppList {
    pub apps: Vec<AppConfig>,
}

impl AppList {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read app list {}", path.display()))?;
        let list: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid app list JSON at {}", path.display()))?;
        Ok(list)
    }
}

/// Default location of the installed-apps state: `~/.rusty-installer/state.json`.
pub fn default_state_path() -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".rusty-installer").join("state.json")
}
