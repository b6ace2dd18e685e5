use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use deploy::config::{DeployConfig, DEFAULT_CONFIG_FILE};
use deploy::error::DeployError;
use deploy::fixture::Fixture;
use deploy::record::RecordStore;
use deploy::shared::{connect_readonly, load_env, process_env, Endpoint};
use deploy::telemetry;
use tracing::{error, info, warn};

/// Prints what the deployment record says was deployed, read back from chain.
#[derive(Parser, Debug)]
#[command(name = "tools")]
struct Args {
    #[arg(long, env = "DEPLOY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[arg(long, env = "DEPLOY_NETWORK", default_value = "development")]
    network: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_path = load_env();
    telemetry::init();
    if let Some(path) = dotenv_path {
        tracing::debug!("loaded environment from {}", path.display());
    }
    let args = Args::parse();
    match inspect(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn inspect(args: &Args) -> Result<(), DeployError> {
    let config = DeployConfig::from_file(&args.config)?;
    let network = config.network(&args.network)?;
    let record = RecordStore::new(&config.deployments_dir).load(&args.network)?;
    let Some(deployer) = record.deployer else {
        warn!(network = %args.network, "nothing deployed yet");
        return Ok(());
    };

    // no mnemonic needed to read
    let endpoint = Endpoint::resolve(&args.network, network, process_env, false)?;
    let fixture = Fixture::connect(connect_readonly(&endpoint), deployer, &record);

    info!(
        network = %args.network,
        network_id = %network.network_id,
        deployer = %deployer,
        "{} token(s) on record",
        fixture.tokens.len()
    );
    for migration in &record.migrations {
        let Some(token) = fixture.token_info(&migration.symbol).await? else {
            continue;
        };
        let balance = fixture
            .balance_of(&migration.symbol, migration.deployer)
            .await?
            .unwrap_or_default();
        info!(
            "{} ({}) at {}: decimals {}, total supply {}, balance of deployer {} {}, deployed {}",
            token.name,
            token.symbol,
            token.address,
            token.decimals,
            token.total_supply,
            migration.deployer,
            balance,
            migration.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}
