use std::path::PathBuf;

use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use dotenvy::dotenv;
use reqwest::Url;
use tracing::info;

use crate::chain::{EvmChain, TxSettings};
use crate::config::NetworkConfig;
use crate::error::DeployError;

/// Loads `.env` into the process environment if one exists. Call before
/// the log subscriber is installed so `RUST_LOG` from the file applies.
pub fn load_env() -> Option<PathBuf> {
    dotenv().ok()
}

/// Reads a variable from the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Everything needed to open a connection, resolved from config and env.
#[derive(Debug)]
pub struct Endpoint {
    pub network: String,
    pub url: Url,
    pub signer: Option<PrivateKeySigner>,
}

impl Endpoint {
    /// Resolves the RPC url and, when `with_signer` is set, the mnemonic
    /// account. Nothing here touches the network.
    pub fn resolve<F>(
        name: &str,
        network: &NetworkConfig,
        env: F,
        with_signer: bool,
    ) -> Result<Self, DeployError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (url, signer) = match (&network.provider, &network.host) {
            (Some(provider), _) => {
                let url = interpolate(&provider.url, &env)?;
                let signer = match &provider.mnemonic {
                    Some(phrase) if with_signer => {
                        let phrase = interpolate(phrase, &env)?;
                        Some(signer_from_mnemonic(&phrase, provider.account_index)?)
                    }
                    _ => None,
                };
                (url, signer)
            }
            (None, Some(host)) => (format!("http://{}:{}", host, network.port.unwrap_or(8545)), None),
            (None, None) => return Err(DeployError::NoEndpoint(name.to_string())),
        };
        let url = Url::parse(&url).map_err(|e| DeployError::InvalidUrl {
            url: redact(&url),
            reason: e.to_string(),
        })?;
        Ok(Self {
            network: name.to_string(),
            url,
            signer,
        })
    }
}

/// Opens a signing connection. Without a mnemonic, transactions are sent
/// from the node's first unlocked account.
pub async fn connect(endpoint: Endpoint, network: &NetworkConfig) -> Result<EvmChain, DeployError> {
    let settings = TxSettings::from(network);
    let (provider, from) = match endpoint.signer {
        Some(signer) => {
            let from = signer.address();
            let provider = ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(endpoint.url)
                .erased();
            (provider, from)
        }
        None => {
            let host = endpoint.url.to_string();
            let provider = ProviderBuilder::new().connect_http(endpoint.url).erased();
            let accounts = provider.get_accounts().await?;
            let from = accounts
                .first()
                .copied()
                .ok_or(DeployError::NoAccounts(host))?;
            (provider, from)
        }
    };
    info!(network = %endpoint.network, deployer = %from, "connected");
    Ok(EvmChain::new(provider, from, settings))
}

/// Read-only connection for inspecting deployed contracts.
pub fn connect_readonly(endpoint: &Endpoint) -> DynProvider {
    ProviderBuilder::new().connect_http(endpoint.url.clone()).erased()
}

fn signer_from_mnemonic(phrase: &str, index: u32) -> Result<PrivateKeySigner, DeployError> {
    let signer = MnemonicBuilder::<English>::default()
        .phrase(phrase.trim())
        .index(index)?
        .build()?;
    Ok(signer)
}

/// Replaces `${VAR}` references with values from `env`. Unset and empty
/// variables are both errors.
pub fn interpolate<F>(template: &str, env: F) -> Result<String, DeployError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| DeployError::MissingEnv(after.to_string()))?;
        let name = &after[..end];
        match env(name) {
            Some(value) if !value.trim().is_empty() => out.push_str(&value),
            _ => return Err(DeployError::MissingEnv(name.to_string())),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Strips the path so API keys embedded in urls stay out of logs.
fn redact(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.split('/').next().unwrap_or_default();
            format!("{scheme}://{host}/...")
        }
        None => "<unparseable>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkId, ProviderConfig};
    use alloy::primitives::address;
    use std::collections::HashMap;

    // Hardhat/Anvil's well-known development mnemonic.
    const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

    fn goerli() -> NetworkConfig {
        NetworkConfig {
            host: None,
            port: None,
            network_id: NetworkId::Id(5),
            provider: Some(ProviderConfig {
                url: "https://goerli.infura.io/v3/${INFURA_KEY}".to_string(),
                mnemonic: Some("${MNEMONIC}".to_string()),
                account_index: 0,
            }),
            confirmations: 1,
            timeout_blocks: 700,
            skip_dry_run: true,
            gas: Some(1_000_000),
            gas_price: None,
            block_time_secs: 12,
        }
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_goerli_endpoint() {
        let endpoint = Endpoint::resolve(
            "goerli",
            &goerli(),
            env(&[("MNEMONIC", TEST_MNEMONIC), ("INFURA_KEY", "abc123")]),
            true,
        )
        .unwrap();
        assert_eq!(endpoint.url.as_str(), "https://goerli.infura.io/v3/abc123");
        let signer = endpoint.signer.unwrap();
        assert_eq!(
            signer.address(),
            address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
    }

    #[test]
    fn test_missing_credentials() {
        let missing_key = Endpoint::resolve("goerli", &goerli(), env(&[("MNEMONIC", TEST_MNEMONIC)]), true);
        assert!(matches!(missing_key, Err(DeployError::MissingEnv(v)) if v == "INFURA_KEY"));

        let missing_mnemonic = Endpoint::resolve("goerli", &goerli(), env(&[("INFURA_KEY", "abc")]), true);
        assert!(matches!(missing_mnemonic, Err(DeployError::MissingEnv(v)) if v == "MNEMONIC"));

        let empty = Endpoint::resolve(
            "goerli",
            &goerli(),
            env(&[("INFURA_KEY", "abc"), ("MNEMONIC", "  ")]),
            true,
        );
        assert!(matches!(empty, Err(DeployError::MissingEnv(_))));
    }

    #[test]
    fn test_invalid_mnemonic() {
        let result = Endpoint::resolve(
            "goerli",
            &goerli(),
            env(&[("INFURA_KEY", "abc"), ("MNEMONIC", "definitely not a seed phrase")]),
            true,
        );
        assert!(matches!(result, Err(DeployError::Signer(_))));
    }

    #[test]
    fn test_readonly_skips_mnemonic() {
        let endpoint =
            Endpoint::resolve("goerli", &goerli(), env(&[("INFURA_KEY", "abc")]), false).unwrap();
        assert!(endpoint.signer.is_none());
    }

    #[test]
    fn test_host_port_endpoint() {
        let endpoint =
            Endpoint::resolve("development", &NetworkConfig::local("127.0.0.1", 8545), env(&[]), true)
                .unwrap();
        assert_eq!(endpoint.url.as_str(), "http://127.0.0.1:8545/");
        assert!(endpoint.signer.is_none());

        let mut nowhere = NetworkConfig::local("127.0.0.1", 8545);
        nowhere.host = None;
        let result = Endpoint::resolve("nowhere", &nowhere, env(&[]), true);
        assert!(matches!(result, Err(DeployError::NoEndpoint(n)) if n == "nowhere"));
    }

    #[test]
    fn test_interpolate() {
        let vars = env(&[("A", "1"), ("B", "two")]);
        assert_eq!(interpolate("x${A}y${B}z", &vars).unwrap(), "x1ytwoz");
        assert_eq!(interpolate("plain", &vars).unwrap(), "plain");
        assert!(matches!(interpolate("${C}", &vars), Err(DeployError::MissingEnv(v)) if v == "C"));
        assert!(interpolate("${A", &vars).is_err());
    }

    #[test]
    fn test_invalid_url_is_redacted() {
        let mut network = goerli();
        network.provider.as_mut().unwrap().url = "not a url ${INFURA_KEY}".to_string();
        let err = Endpoint::resolve("goerli", &network, env(&[("INFURA_KEY", "secret")]), false)
            .unwrap_err();
        assert!(!err.to_string().contains("secret"));
    }
}
