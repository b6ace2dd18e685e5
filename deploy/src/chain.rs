//! The calls a token migration makes against a chain, and their EVM
//! implementation over an `alloy` provider.

use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::debug;

use crate::config::NetworkConfig;
use crate::error::DeployError;

sol! {
    #[sol(rpc)]
    interface IMintableERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function mint(uint256 amount) external;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub tx_hash: TxHash,
}

#[async_trait]
pub trait TokenChain: Send + Sync {
    /// Account that signs and pays for every transaction.
    fn deployer(&self) -> Address;

    async fn network_id(&self) -> Result<u64, DeployError>;

    /// Whether any runtime code lives at `address`.
    async fn has_code(&self, address: Address) -> Result<bool, DeployError>;

    /// Simulates a contract creation and returns its gas estimate.
    async fn estimate_deploy(&self, code: &Bytes) -> Result<u64, DeployError>;

    async fn deploy(&self, code: Bytes) -> Result<Deployment, DeployError>;

    async fn decimals(&self, token: Address) -> Result<u8, DeployError>;

    /// Mints `amount` base units to the deployer.
    async fn mint(&self, token: Address, amount: U256) -> Result<TxHash, DeployError>;
}

/// Per-transaction settings taken from the network entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSettings {
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
    pub confirmations: u64,
    pub timeout: Duration,
}

impl From<&NetworkConfig> for TxSettings {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            gas: network.gas,
            gas_price: network.gas_price.map(u128::from),
            confirmations: network.confirmations,
            timeout: network.confirmation_timeout(),
        }
    }
}

impl TxSettings {
    /// Blocks to observe, counting the one that includes the transaction.
    pub fn required_confirmations(&self) -> u64 {
        self.confirmations.saturating_add(1)
    }
}

#[derive(Clone)]
pub struct EvmChain {
    provider: DynProvider,
    from: Address,
    settings: TxSettings,
}

impl EvmChain {
    pub fn new(provider: DynProvider, from: Address, settings: TxSettings) -> Self {
        Self {
            provider,
            from,
            settings,
        }
    }

    pub fn provider(&self) -> DynProvider {
        self.provider.clone()
    }

    fn request(&self) -> TransactionRequest {
        let mut tx = TransactionRequest::default().with_from(self.from);
        if let Some(gas) = self.settings.gas {
            tx.set_gas_limit(gas);
        }
        if let Some(gas_price) = self.settings.gas_price {
            tx.set_gas_price(gas_price);
        }
        tx
    }

    async fn send(&self, tx: TransactionRequest) -> Result<TransactionReceipt, DeployError> {
        let pending = self.provider.send_transaction(tx).await?;
        debug!(tx = %pending.tx_hash(), "transaction sent");
        let receipt = pending
            .with_required_confirmations(self.settings.required_confirmations())
            .with_timeout(Some(self.settings.timeout))
            .get_receipt()
            .await?;
        if !receipt.status() {
            return Err(DeployError::Reverted(receipt.transaction_hash));
        }
        Ok(receipt)
    }
}

#[async_trait]
impl TokenChain for EvmChain {
    fn deployer(&self) -> Address {
        self.from
    }

    async fn network_id(&self) -> Result<u64, DeployError> {
        Ok(self.provider.get_net_version().await?)
    }

    async fn has_code(&self, address: Address) -> Result<bool, DeployError> {
        let code = self.provider.get_code_at(address).await?;
        Ok(!code.is_empty())
    }

    async fn estimate_deploy(&self, code: &Bytes) -> Result<u64, DeployError> {
        let tx = self.request().with_deploy_code(code.clone());
        Ok(self.provider.estimate_gas(tx).await?)
    }

    async fn deploy(&self, code: Bytes) -> Result<Deployment, DeployError> {
        let receipt = self.send(self.request().with_deploy_code(code)).await?;
        let address = receipt
            .contract_address
            .ok_or(DeployError::MissingContractAddress(receipt.transaction_hash))?;
        Ok(Deployment {
            address,
            tx_hash: receipt.transaction_hash,
        })
    }

    async fn decimals(&self, token: Address) -> Result<u8, DeployError> {
        let token = IMintableERC20::new(token, self.provider.clone());
        Ok(token.decimals().call().await?)
    }

    async fn mint(&self, token: Address, amount: U256) -> Result<TxHash, DeployError> {
        let call = IMintableERC20::mintCall { amount };
        let tx = self.request().with_to(token).with_input(call.abi_encode());
        let receipt = self.send(tx).await?;
        Ok(receipt.transaction_hash)
    }
}
