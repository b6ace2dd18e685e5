use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use deploy::config::DEFAULT_CONFIG_FILE;
use deploy::deployer::{self, DeployTarget, OnChainDeployParams};
use deploy::shared::load_env;
use deploy::telemetry;

/// Deploys the configured tokens and mints their initial supply.
#[derive(Parser, Debug)]
#[command(name = "deploy", version)]
struct Args {
    /// Path to the deployment config
    #[arg(long, env = "DEPLOY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Network entry to deploy to
    #[arg(long, env = "DEPLOY_NETWORK", default_value = "development")]
    network: String,

    /// Forget previously applied migrations and run them all again
    #[arg(long)]
    reset: bool,

    /// Send transactions without estimating them first
    #[arg(long)]
    skip_dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_path = load_env();
    telemetry::init();
    if let Some(path) = dotenv_path {
        tracing::debug!("loaded environment from {}", path.display());
    }
    let args = Args::parse();

    let target = DeployTarget::OnChain(OnChainDeployParams {
        config_path: args.config,
        network: args.network,
        reset: args.reset,
        skip_dry_run: args.skip_dry_run,
    });
    match deployer::deploy(target).await {
        Ok(fixture) => {
            tracing::info!(
                deployer = %fixture.deployer,
                tokens = fixture.tokens.len(),
                "migrations complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("deployment failed: {e}");
            ExitCode::FAILURE
        }
    }
}
