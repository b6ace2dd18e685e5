use std::path::PathBuf;

use alloy::node_bindings::{Anvil, AnvilInstance};
use alloy::primitives::U256;
use deploy::chain::EvmChain;
use deploy::config::{DeployConfig, NetworkConfig};
use deploy::deployer::{self, DeployTarget, LocalDeployParams};
use deploy::error::DeployError;
use deploy::fixture::Fixture;
use deploy::shared::{connect, Endpoint};
use tempfile::TempDir;

pub const NETWORK: &str = "development";
pub const ANVIL_CHAIN_ID: u64 = 31337;

pub fn whole_tokens(amount: u64, decimals: u8) -> U256 {
    U256::from(amount) * U256::from(10u8).pow(U256::from(decimals))
}

/// A throwaway Anvil node plus a project config whose records live in a
/// temp dir. Keep it alive for the duration of the test.
pub struct Env {
    pub anvil: AnvilInstance,
    pub records: TempDir,
    pub config: DeployConfig,
}

impl Env {
    pub fn new() -> Env {
        let anvil = Anvil::new().spawn();
        let records = tempfile::tempdir().unwrap();
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..");
        let mut config = DeployConfig::from_file(root.join("deploy.toml")).unwrap();
        config.deployments_dir = records.path().to_path_buf();
        config
            .networks
            .insert(NETWORK.to_string(), NetworkConfig::local("127.0.0.1", anvil.port()));
        Env {
            anvil,
            records,
            config,
        }
    }

    pub fn network(&mut self) -> &mut NetworkConfig {
        self.config.networks.get_mut(NETWORK).unwrap()
    }

    pub async fn chain(&self) -> EvmChain {
        let network = self.config.network(NETWORK).unwrap();
        let endpoint = Endpoint::resolve(NETWORK, network, |_| None, true).unwrap();
        connect(endpoint, network).await.unwrap()
    }

    pub async fn deploy(&self, reset: bool) -> Result<Fixture, DeployError> {
        deployer::deploy(DeployTarget::Local(LocalDeployParams {
            chain: self.chain().await,
            config: self.config.clone(),
            network: NETWORK.to_string(),
            reset,
        }))
        .await
    }
}
