use std::path::PathBuf;

use alloy::primitives::TxHash;
use alloy::providers::PendingTransactionError;
use alloy::signers::local::LocalSignerError;
use alloy::transports::TransportError;
use thiserror::Error;

/// Everything that can abort a migration run.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),
    #[error("network `{0}` defines neither a provider nor host/port")]
    NoEndpoint(String),
    #[error("missing env var {0}")]
    MissingEnv(String),
    #[error("invalid RPC url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid mnemonic: {0}")]
    Signer(#[from] LocalSignerError),
    #[error(transparent)]
    Rpc(#[from] TransportError),
    #[error(transparent)]
    Contract(#[from] alloy::contract::Error),
    #[error(transparent)]
    PendingTx(#[from] PendingTransactionError),
    #[error("connected to network id {actual}, network `{network}` expects {expected}")]
    NetworkIdMismatch {
        network: String,
        expected: u64,
        actual: u64,
    },
    #[error("node at {0} exposes no unlocked accounts")]
    NoAccounts(String),
    #[error("transaction {0} reverted")]
    Reverted(TxHash),
    #[error("deployment transaction {0} produced no contract address")]
    MissingContractAddress(TxHash),
    #[error("artifact {path}: {reason}")]
    Artifact { path: PathBuf, reason: String },
    #[error("{contract} was compiled with {found}, config expects {expected}")]
    CompilerMismatch {
        contract: String,
        expected: String,
        found: String,
    },
    #[error("invalid token amount `{0}`")]
    InvalidAmount(String),
    #[error("amount {amount} overflows uint256 at {decimals} decimals")]
    AmountOverflow { amount: String, decimals: u8 },
    #[error("deployment record {path}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("token symbol `{0}` is configured more than once")]
    DuplicateToken(String),
}

impl DeployError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeployError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DeployError::Artifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
