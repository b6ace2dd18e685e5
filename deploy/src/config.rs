//! `deploy.toml`: networks, compiler settings and the ordered token list.
//!
//! A network either names a `provider` (RPC url plus an optional mnemonic,
//! both allowing `${VAR}` interpolation) or a plain `host`/`port` pair served
//! by a node with unlocked accounts.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use maplit::btreemap;
use serde::{Deserialize, Serialize};

use crate::error::DeployError;

pub const DEFAULT_CONFIG_FILE: &str = "deploy.toml";
const DEFAULT_TIMEOUT_BLOCKS: u64 = 50;
const DEFAULT_BLOCK_TIME_SECS: u64 = 12;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployConfig {
    pub artifacts_dir: PathBuf,
    pub deployments_dir: PathBuf,
    pub networks: BTreeMap<String, NetworkConfig>,
    pub compilers: CompilersConfig,
    pub tokens: Vec<TokenConfig>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("build/contracts"),
            deployments_dir: PathBuf::from("build/deployments"),
            networks: btreemap! {
                "development".to_string() => NetworkConfig::local("127.0.0.1", 8545),
            },
            compilers: CompilersConfig::default(),
            tokens: Vec::new(),
        }
    }
}

impl DeployConfig {
    /// Reads and validates a config file. Relative directories are resolved
    /// against the file's own directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DeployError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| DeployError::io(path, e))?;
        let mut config = Self::from_toml(&raw).map_err(|source| match source {
            ParseError::Toml(source) => DeployError::Config {
                path: path.to_path_buf(),
                source,
            },
            ParseError::Invalid(e) => e,
        })?;
        if let Some(base) = path.parent() {
            config.artifacts_dir = base.join(&config.artifacts_dir);
            config.deployments_dir = base.join(&config.deployments_dir);
        }
        Ok(config)
    }

    fn from_toml(raw: &str) -> Result<Self, ParseError> {
        let config: DeployConfig = toml::from_str(raw).map_err(ParseError::Toml)?;
        config.validate().map_err(ParseError::Invalid)?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), DeployError> {
        let mut seen = HashSet::new();
        for token in &self.tokens {
            if !seen.insert(token.symbol.as_str()) {
                return Err(DeployError::DuplicateToken(token.symbol.clone()));
            }
        }
        Ok(())
    }

    pub fn network(&self, name: &str) -> Result<&NetworkConfig, DeployError> {
        self.networks
            .get(name)
            .ok_or_else(|| DeployError::UnknownNetwork(name.to_string()))
    }
}

enum ParseError {
    Toml(toml::de::Error),
    Invalid(DeployError),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub network_id: NetworkId,
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default = "default_timeout_blocks")]
    pub timeout_blocks: u64,
    #[serde(default)]
    pub skip_dry_run: bool,
    /// Gas limit per transaction; estimated by the node when unset.
    pub gas: Option<u64>,
    /// Legacy gas price in wei; the provider's fee estimate is used when unset.
    pub gas_price: Option<u64>,
    #[serde(default = "default_block_time_secs")]
    pub block_time_secs: u64,
}

fn default_timeout_blocks() -> u64 {
    DEFAULT_TIMEOUT_BLOCKS
}

fn default_block_time_secs() -> u64 {
    DEFAULT_BLOCK_TIME_SECS
}

impl NetworkConfig {
    pub fn local(host: &str, port: u16) -> Self {
        Self {
            host: Some(host.to_string()),
            port: Some(port),
            network_id: NetworkId::Any,
            provider: None,
            confirmations: 0,
            timeout_blocks: DEFAULT_TIMEOUT_BLOCKS,
            skip_dry_run: false,
            gas: None,
            gas_price: None,
            block_time_secs: DEFAULT_BLOCK_TIME_SECS,
        }
    }

    /// How long to wait for a transaction before giving up.
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_blocks.saturating_mul(self.block_time_secs))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub url: String,
    pub mnemonic: Option<String>,
    /// HD account index under `m/44'/60'/0'/0/`.
    #[serde(default)]
    pub account_index: u32,
}

/// `*` accepts whatever network the node reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(try_from = "RawNetworkId", into = "RawNetworkId")]
pub enum NetworkId {
    #[default]
    Any,
    Id(u64),
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkId::Any => f.write_str("*"),
            NetworkId::Id(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum RawNetworkId {
    Number(u64),
    Text(String),
}

impl TryFrom<RawNetworkId> for NetworkId {
    type Error = String;

    fn try_from(raw: RawNetworkId) -> Result<Self, Self::Error> {
        match raw {
            RawNetworkId::Number(id) => Ok(NetworkId::Id(id)),
            RawNetworkId::Text(text) if text == "*" => Ok(NetworkId::Any),
            RawNetworkId::Text(text) => text
                .parse()
                .map(NetworkId::Id)
                .map_err(|_| format!("network_id must be a number or \"*\", got `{text}`")),
        }
    }
}

impl From<NetworkId> for RawNetworkId {
    fn from(id: NetworkId) -> Self {
        match id {
            NetworkId::Any => RawNetworkId::Text("*".to_string()),
            NetworkId::Id(id) => RawNetworkId::Number(id),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilersConfig {
    pub solc: SolcConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolcConfig {
    pub version: String,
    pub settings: SolcSettings,
}

impl Default for SolcConfig {
    fn default() -> Self {
        Self {
            version: "0.8.15".to_string(),
            settings: SolcSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolcSettings {
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub enabled: bool,
    pub runs: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            runs: 200,
        }
    }
}

/// One deploy-and-mint step.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    #[serde(default = "default_contract")]
    pub contract: String,
    pub name: String,
    pub symbol: String,
    /// Whole tokens minted to the deployer after deployment.
    pub mint: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_contract() -> String {
    "MintableERC20".to_string()
}

fn default_enabled() -> bool {
    true
}
