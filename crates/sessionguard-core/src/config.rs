//! Application configuration management.
//!
//! This module handles loading the configuration, which selects
//! where the session token lives and where logout sends the user.
//!
//! Configuration is stored at `~/.config/sessionguard/config.json`.
//! `SESSIONGUARD_*` environment variables override values read from disk.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{FileStore, KeyringStore, SessionGuard, DEFAULT_LOGIN_ROUTE};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sessionguard";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_BACKEND: &str = "SESSIONGUARD_BACKEND";
const ENV_LOGIN_ROUTE: &str = "SESSIONGUARD_LOGIN_ROUTE";
const ENV_CACHE_DIR: &str = "SESSIONGUARD_CACHE_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// `session.json` in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            "keyring" | "keychain" => Ok(Backend::Keyring),
            other => Err(anyhow::anyhow!("Unknown token backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub login_route: String,
    /// Keychain account name
    pub account: String,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            account: "default".to_string(),
            cache_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(backend) = lookup(ENV_BACKEND) {
            self.backend = backend
                .parse()
                .with_context(|| format!("Invalid {}", ENV_BACKEND))?;
        }
        if let Some(route) = lookup(ENV_LOGIN_ROUTE) {
            self.login_route = route;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Build a guard over the configured backend
    pub fn session_guard(&self) -> Result<SessionGuard> {
        let guard = match self.backend {
            Backend::File => SessionGuard::new(FileStore::new(self.cache_dir()?)),
            Backend::Keyring => SessionGuard::new(KeyringStore::new(self.account.clone())),
        };
        Ok(guard.with_login_route(self.login_route.clone()))
    }
}

// ============================================================================
// Tests
// ============================================================================
