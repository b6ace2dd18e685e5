use std::collections::HashMap;
use std::path::{Path, PathBuf};

use alloy::primitives::{Address, TxHash, U256};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::chain::{EvmChain, TokenChain};
use crate::config::{DeployConfig, NetworkConfig, NetworkId, SolcConfig, TokenConfig};
use crate::error::DeployError;
use crate::fixture::Fixture;
use crate::record::{AppliedMigration, DeploymentRecord, RecordStore};
use crate::shared::{connect, load_env, process_env, Endpoint};
use crate::units::{parse_whole, scale_whole};

/// One enabled token entry, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMigration {
    pub contract: String,
    pub name: String,
    pub symbol: String,
    /// Whole tokens; scaled by the contract's `decimals()` at mint time.
    pub mint: U256,
}

impl TryFrom<&TokenConfig> for TokenMigration {
    type Error = DeployError;

    fn try_from(token: &TokenConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            contract: token.contract.clone(),
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            mint: parse_whole(&token.mint)?,
        })
    }
}

/// Enabled token entries in configuration order. Disabled entries are
/// dropped here and never reach the chain.
pub fn plan(tokens: &[TokenConfig]) -> Result<Vec<TokenMigration>, DeployError> {
    tokens
        .iter()
        .filter(|token| {
            if !token.enabled {
                debug!(symbol = %token.symbol, "skipping disabled token");
            }
            token.enabled
        })
        .map(TokenMigration::try_from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployResult {
    pub symbol: String,
    pub address: Address,
    pub deploy_tx: TxHash,
    pub mint_tx: TxHash,
    pub minted: U256,
}

/// What a run needs besides the chain itself.
#[derive(Debug, Clone)]
pub struct MigrationContext<'a> {
    pub network_name: &'a str,
    pub network: &'a NetworkConfig,
    pub solc: &'a SolcConfig,
    pub artifacts_dir: &'a Path,
    pub skip_dry_run: bool,
}

/// Runs every pending migration in order, persisting the record after each
/// one completes. The first failure aborts the run.
pub async fn migrate<C: TokenChain + ?Sized>(
    chain: &C,
    ctx: &MigrationContext<'_>,
    migrations: &[TokenMigration],
    record: &mut DeploymentRecord,
    store: &RecordStore,
) -> Result<Vec<DeployResult>, DeployError> {
    let network_id = chain.network_id().await?;
    if let NetworkId::Id(expected) = ctx.network.network_id {
        if expected != network_id {
            return Err(DeployError::NetworkIdMismatch {
                network: ctx.network_name.to_string(),
                expected,
                actual: network_id,
            });
        }
    }
    if let Some(recorded) = record.network_id {
        if recorded != network_id && !record.migrations.is_empty() {
            warn!(
                network = %ctx.network_name,
                recorded,
                actual = network_id,
                "record was written against another chain, starting over"
            );
            record.clear();
        }
    }
    record.network_id = Some(network_id);
    record.deployer = Some(chain.deployer());

    // an entry only counts while its contract still exists on the node
    let mut pending: Vec<&TokenMigration> = Vec::with_capacity(migrations.len());
    for migration in migrations {
        match record.get(&migration.symbol) {
            Some(applied) if chain.has_code(applied.address).await? => {
                info!(symbol = %migration.symbol, "already deployed, skipping");
            }
            Some(applied) => {
                warn!(
                    symbol = %migration.symbol,
                    address = %applied.address,
                    "no code at recorded address, redeploying"
                );
                pending.push(migration);
            }
            None => pending.push(migration),
        }
    }

    // every artifact is checked before the first transaction goes out
    let mut artifacts: HashMap<&str, Artifact> = HashMap::new();
    for migration in &pending {
        if !artifacts.contains_key(migration.contract.as_str()) {
            let artifact = Artifact::load(ctx.artifacts_dir, &migration.contract)?;
            artifact.check_compiler(ctx.solc)?;
            artifacts.insert(migration.contract.as_str(), artifact);
        }
    }

    let mut results = Vec::with_capacity(pending.len());
    for migration in pending {
        let artifact = &artifacts[migration.contract.as_str()];
        let result = run_one(chain, ctx, artifact, migration).await?;
        record.push(AppliedMigration {
            contract: migration.contract.clone(),
            name: migration.name.clone(),
            symbol: migration.symbol.clone(),
            address: result.address,
            deployer: chain.deployer(),
            deploy_tx: result.deploy_tx,
            mint_tx: result.mint_tx,
            minted: result.minted.to_string(),
            completed_at: Utc::now(),
        });
        store.save(record)?;
        results.push(result);
    }
    Ok(results)
}

async fn run_one<C: TokenChain + ?Sized>(
    chain: &C,
    ctx: &MigrationContext<'_>,
    artifact: &Artifact,
    migration: &TokenMigration,
) -> Result<DeployResult, DeployError> {
    info!(
        "Deploying {} '{}' ({})...",
        migration.contract, migration.name, migration.symbol
    );
    let code = artifact.creation_code(&migration.name, &migration.symbol);
    if !ctx.skip_dry_run {
        let gas = chain.estimate_deploy(&code).await?;
        info!(symbol = %migration.symbol, gas, "dry run ok");
    }
    let deployment = chain.deploy(code).await?;
    info!(
        symbol = %migration.symbol,
        address = %deployment.address,
        tx = %deployment.tx_hash,
        "deployed"
    );

    let decimals = chain.decimals(deployment.address).await?;
    let amount = scale_whole(migration.mint, decimals)?;
    let mint_tx = chain.mint(deployment.address, amount).await?;
    info!(
        symbol = %migration.symbol,
        whole = %migration.mint,
        decimals,
        tx = %mint_tx,
        "minted to {}",
        chain.deployer()
    );
    Ok(DeployResult {
        symbol: migration.symbol.clone(),
        address: deployment.address,
        deploy_tx: deployment.tx_hash,
        mint_tx,
        minted: amount,
    })
}

pub struct LocalDeployParams {
    pub chain: EvmChain,
    pub config: DeployConfig,
    pub network: String,
    pub reset: bool,
}

pub struct OnChainDeployParams {
    pub config_path: PathBuf,
    pub network: String,
    pub reset: bool,
    pub skip_dry_run: bool,
}

pub enum DeployTarget {
    Local(LocalDeployParams),
    OnChain(OnChainDeployParams),
}

/// Connects (for on-chain targets), runs the pending migrations and returns
/// a fixture over every token the network's record knows about.
pub async fn deploy(target: DeployTarget) -> Result<Fixture, DeployError> {
    let (chain, config, network_name, reset, force_skip_dry_run) = match target {
        DeployTarget::Local(p) => (p.chain, p.config, p.network, p.reset, false),
        DeployTarget::OnChain(p) => {
            let _ = load_env();
            let config = DeployConfig::from_file(&p.config_path)?;
            let network = config.network(&p.network)?;
            let endpoint = Endpoint::resolve(&p.network, network, process_env, true)?;
            let chain = connect(endpoint, network).await?;
            (chain, config, p.network, p.reset, p.skip_dry_run)
        }
    };
    let network = config.network(&network_name)?;
    let migrations = plan(&config.tokens)?;

    let store = RecordStore::new(&config.deployments_dir);
    let mut record = store.load(&network_name)?;
    if reset && !record.migrations.is_empty() {
        warn!(
            network = %network_name,
            count = record.migrations.len(),
            "reset requested, redeploying everything"
        );
        record.clear();
    }

    let ctx = MigrationContext {
        network_name: &network_name,
        network,
        solc: &config.compilers.solc,
        artifacts_dir: &config.artifacts_dir,
        skip_dry_run: force_skip_dry_run || network.skip_dry_run,
    };
    let results = migrate(&chain, &ctx, &migrations, &mut record, &store).await?;
    if results.is_empty() {
        info!(network = %network_name, "nothing to migrate");
    }
    for result in &results {
        info!("{}: {}", result.symbol, result.address);
    }

    Ok(Fixture::connect(chain.provider(), chain.deployer(), &record))
}
