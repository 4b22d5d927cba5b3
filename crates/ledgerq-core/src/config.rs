//! Session configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! channel = "mychannel"
//! orderer_url = "http://localhost:7050"
//! ca_url = "http://localhost:7054"
//! proposal_timeout = "10s"
//! commit_timeout = "30s"
//!
//! [[peers]]
//! name = "peer0"
//! url = "http://localhost:7051"
//!
//! [endorsers]
//! mycc = ["peer0"]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Default wait for a single peer's proposal response
const DEFAULT_PROPOSAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wait for a commit notification
const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Peer endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Peer name
    pub name: String,
    /// Base URL of the peer's HTTP endpoint
    pub url: String,
}

/// Configuration of one orchestration session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Channel the session works on
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Known peers
    #[serde(default)]
    pub peers: Vec<PeerConfig>,

    /// Ordering service URL
    #[serde(default)]
    pub orderer_url: Option<String>,

    /// Certificate authority URL
    #[serde(default)]
    pub ca_url: Option<String>,

    /// Endorsing peers per chaincode
    #[serde(default)]
    pub endorsers: BTreeMap<String, Vec<String>>,

    /// Per-peer proposal timeout
    #[serde(with = "humantime_serde", default = "default_proposal_timeout")]
    pub proposal_timeout: Duration,

    /// Bound on the commit wait
    #[serde(with = "humantime_serde", default = "default_commit_timeout")]
    pub commit_timeout: Duration,

    /// Credential store directory; in-memory store when absent
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

fn default_channel() -> String {
    "mychannel".to_string()
}

fn default_proposal_timeout() -> Duration {
    DEFAULT_PROPOSAL_TIMEOUT
}

fn default_commit_timeout() -> Duration {
    DEFAULT_COMMIT_TIMEOUT
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            peers: Vec::new(),
            orderer_url: None,
            ca_url: None,
            endorsers: BTreeMap::new(),
            proposal_timeout: default_proposal_timeout(),
            commit_timeout: default_commit_timeout(),
            store_dir: None,
        }
    }
}

impl SessionConfig {
    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let config: SessionConfig =
            toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> CoreResult<()> {
        if self.channel.is_empty() {
            return Err(CoreError::Config("channel name is empty".to_string()));
        }
        if self.proposal_timeout.is_zero() || self.commit_timeout.is_zero() {
            return Err(CoreError::Config("timeouts must be non-zero".to_string()));
        }
        let mut seen = HashSet::new();
        for peer in &self.peers {
            if !seen.insert(peer.name.as_str()) {
                return Err(CoreError::Config(format!("duplicate peer {}", peer.name)));
            }
        }
        Ok(())
    }

    /// Set the endorsing peers of a chaincode
    pub fn with_endorsers<I, S>(mut self, chaincode: impl Into<String>, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endorsers
            .insert(chaincode.into(), peers.into_iter().map(Into::into).collect());
        self
    }

    /// Endorsing peers configured for `chaincode`; empty when none
    pub fn endorsers_for(&self, chaincode: &str) -> &[String] {
        self.endorsers
            .get(chaincode)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
