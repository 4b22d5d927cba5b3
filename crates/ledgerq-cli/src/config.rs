//! CLI configuration management

use std::path::{Path, PathBuf};

use ledgerq_core::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::CliError;

/// Which network the CLI talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// In-process network, reset on every run
    #[default]
    Mock,
    /// HTTP/JSON endpoints from the session section
    Http,
}

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network backend
    #[serde(default)]
    pub network: NetworkMode,
    /// Enrollment id used by channel and chaincode commands
    #[serde(default = "default_user")]
    pub user: String,
    /// Enrollment secret for `user`
    #[serde(default = "default_secret")]
    pub secret: String,
    /// Directory chaincode package paths are resolved against
    #[serde(default)]
    pub chaincode_dir: Option<PathBuf>,
    /// Session settings
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_user() -> String {
    "admin".to_string()
}

fn default_secret() -> String {
    "adminpw".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkMode::default(),
            user: default_user(),
            secret: default_secret(),
            chaincode_dir: None,
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".ledgerq"))
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Load `path`, or the default location; defaults when the file is missing
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::config_path) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?;
        config
            .session
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save to `path`, or the default location
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, CliError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Self::config_path)
            .ok_or_else(|| CliError::Config("cannot determine config path".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| CliError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Credential store directory, using `~/.ledgerq/credentials` if not configured
    pub fn store_dir(&self) -> Option<PathBuf> {
        self.session
            .store_dir
            .clone()
            .or_else(|| Self::config_dir().map(|d| d.join("credentials")))
    }

    /// Directory chaincode packages are read from, defaulting to the working directory
    pub fn chaincode_dir(&self) -> PathBuf {
        self.chaincode_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
