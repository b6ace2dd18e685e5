use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use alloy::providers::DynProvider;

use crate::chain::IMintableERC20;
use crate::chain::IMintableERC20::IMintableERC20Instance;
use crate::error::DeployError;
use crate::record::DeploymentRecord;

/// Handles on every token recorded for a network, keyed by symbol.
pub struct Fixture {
    pub deployer: Address,
    pub provider: DynProvider,
    pub tokens: BTreeMap<String, Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

impl Fixture {
    pub fn connect(provider: DynProvider, deployer: Address, record: &DeploymentRecord) -> Fixture {
        let tokens = record
            .migrations
            .iter()
            .map(|m| (m.symbol.clone(), m.address))
            .collect();
        Fixture {
            deployer,
            provider,
            tokens,
        }
    }

    pub fn address_of(&self, symbol: &str) -> Option<Address> {
        self.tokens.get(symbol).copied()
    }

    fn token(&self, symbol: &str) -> Option<IMintableERC20Instance<DynProvider>> {
        self.address_of(symbol)
            .map(|address| IMintableERC20::new(address, self.provider.clone()))
    }

    pub async fn token_info(&self, symbol: &str) -> Result<Option<TokenInfo>, DeployError> {
        let Some(token) = self.token(symbol) else {
            return Ok(None);
        };
        Ok(Some(TokenInfo {
            address: *token.address(),
            name: token.name().call().await?,
            symbol: token.symbol().call().await?,
            decimals: token.decimals().call().await?,
            total_supply: token.totalSupply().call().await?,
        }))
    }

    pub async fn balance_of(&self, symbol: &str, owner: Address) -> Result<Option<U256>, DeployError> {
        match self.token(symbol) {
            Some(token) => Ok(Some(token.balanceOf(owner).call().await?)),
            None => Ok(None),
        }
    }

    pub async fn deployer_balance(&self, symbol: &str) -> Result<Option<U256>, DeployError> {
        self.balance_of(symbol, self.deployer).await
    }
}
