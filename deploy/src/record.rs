//! Per-network bookkeeping of applied token migrations.

use std::path::{Path, PathBuf};

use alloy::primitives::{Address, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DeployError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    pub contract: String,
    pub name: String,
    pub symbol: String,
    pub address: Address,
    /// Account that deployed and received the mint.
    pub deployer: Address,
    pub deploy_tx: TxHash,
    pub mint_tx: TxHash,
    /// Minted amount in the token's smallest unit, as a decimal string.
    pub minted: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub network: String,
    pub network_id: Option<u64>,
    pub deployer: Option<Address>,
    pub migrations: Vec<AppliedMigration>,
}

impl DeploymentRecord {
    pub fn new(network: &str) -> Self {
        Self {
            network: network.to_string(),
            ..Self::default()
        }
    }

    pub fn is_applied(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    pub fn get(&self, symbol: &str) -> Option<&AppliedMigration> {
        self.migrations.iter().find(|m| m.symbol == symbol)
    }

    pub fn push(&mut self, migration: AppliedMigration) {
        self.migrations.retain(|m| m.symbol != migration.symbol);
        self.migrations.push(migration);
    }

    pub fn clear(&mut self) {
        self.migrations.clear();
    }
}

/// Stores one `<network>.json` per network under a directory.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, network: &str) -> PathBuf {
        self.dir.join(format!("{network}.json"))
    }

    /// Returns an empty record when the network has never been migrated.
    pub fn load(&self, network: &str) -> Result<DeploymentRecord, DeployError> {
        let path = self.path(network);
        if !path.exists() {
            return Ok(DeploymentRecord::new(network));
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| DeployError::io(&path, e))?;
        serde_json::from_str(&raw).map_err(|source| DeployError::Record { path, source })
    }

    pub fn save(&self, record: &DeploymentRecord) -> Result<(), DeployError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| DeployError::io(&self.dir, e))?;
        let path = self.path(&record.network);
        let json = serde_json::to_string_pretty(record).map_err(|source| DeployError::Record {
            path: path.clone(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        write(&tmp, &json)?;
        std::fs::rename(&tmp, &path).map_err(|e| DeployError::io(&path, e))
    }
}

fn write(path: &Path, contents: &str) -> Result<(), DeployError> {
    std::fs::write(path, contents).map_err(|e| DeployError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};

    fn token_b() -> AppliedMigration {
        AppliedMigration {
            contract: "MintableERC20".to_string(),
            name: "Token B".to_string(),
            symbol: "TOKENB".to_string(),
            address: address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            deployer: address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            deploy_tx: b256!("0x1111111111111111111111111111111111111111111111111111111111111111"),
            mint_tx: b256!("0x2222222222222222222222222222222222222222222222222222222222222222"),
            minted: "100000000000000000000000000".to_string(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_gives_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("deployments"));
        let record = store.load("goerli").unwrap();
        assert_eq!(record.network, "goerli");
        assert!(record.migrations.is_empty());
        assert!(!record.is_applied("TOKENB"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("deployments"));
        let mut record = DeploymentRecord::new("development");
        record.network_id = Some(1337);
        record.push(token_b());
        store.save(&record).unwrap();

        assert!(store.path("development").exists());
        assert!(!dir.path().join("deployments/development.json.tmp").exists());
        let loaded = store.load("development").unwrap();
        assert_eq!(loaded, record);
        assert!(loaded.is_applied("TOKENB"));
        assert!(!loaded.is_applied("TOKENA"));
    }

    #[test]
    fn test_push_replaces_same_symbol() {
        let mut record = DeploymentRecord::new("development");
        record.push(token_b());
        let mut again = token_b();
        again.address = Address::ZERO;
        record.push(again);
        assert_eq!(record.migrations.len(), 1);
        assert_eq!(record.get("TOKENB").unwrap().address, Address::ZERO);
        record.clear();
        assert!(record.migrations.is_empty());
    }

    #[test]
    fn test_corrupt_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        std::fs::write(store.path("development"), "{ not json").unwrap();
        assert!(matches!(store.load("development"), Err(DeployError::Record { .. })));
    }
}
