/*
[INPUT]:  YAML configuration file (optional)
[OUTPUT]: Parsed CLI configuration with resolved storage paths
[POS]:    Configuration layer - CLI setup
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use marketplace_session::{ClientConfig, GateConfig, SessionConfig};

const APP_DIR: &str = "marketplace-session";

/// Top-level configuration for the session CLI
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    /// Auth backend connection
    pub api: ClientConfig,
    /// Expiry leeway and fallback token lifetime
    pub session: SessionConfig,
    /// Route tables used by the `gate` command
    pub gate: GateConfig,
    /// Token file; defaults to the platform data directory
    pub store_path: Option<PathBuf>,
    pub wallet: WalletConfig,
}

/// Wallet linking configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// EIP-155 chain id the local signer reports
    pub chain_id: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self { chain_id: 1 }
    }
}

impl CliConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }

    /// Explicit path, else the default location if it exists, else built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match default_config_path() {
            Ok(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("failed to serialize config to YAML")
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => default_store_path(),
        }
    }
}

pub fn default_store_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join(APP_DIR).join("session.json"))
}

pub fn default_config_path() -> Result<PathBuf> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
    Ok(config_dir.join(APP_DIR).join("config.yaml"))
}
