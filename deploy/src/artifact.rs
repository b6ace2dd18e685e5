//! Compiled contract artifacts.
//!
//! Reads the JSON that `solc`-based toolchains leave under the artifacts
//! directory, either Truffle's layout (`bytecode` is a hex string) or
//! Foundry's (`bytecode.object`), and refuses artifacts that were not built
//! with the configured compiler settings.

use std::path::{Path, PathBuf};

use alloy::hex;
use alloy::primitives::Bytes;
use alloy::sol_types::SolValue;
use serde::Deserialize;

use crate::config::{OptimizerConfig, SolcConfig};
use crate::error::DeployError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: Option<String>,
    bytecode: Option<RawBytecode>,
    compiler: Option<RawCompiler>,
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

#[derive(Debug, Deserialize)]
struct RawCompiler {
    version: String,
}

/// Truffle stores metadata as an embedded JSON string, Foundry as an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMetadata {
    Encoded(String),
    Decoded(Metadata),
}

#[derive(Debug, Deserialize)]
struct Metadata {
    compiler: Option<RawCompiler>,
    settings: Option<MetadataSettings>,
}

#[derive(Debug, Deserialize)]
struct MetadataSettings {
    optimizer: Option<OptimizerConfig>,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub contract: String,
    pub path: PathBuf,
    pub bytecode: Bytes,
    pub compiler_version: Option<String>,
    pub optimizer: Option<OptimizerConfig>,
}

impl Artifact {
    pub fn load(artifacts_dir: &Path, contract: &str) -> Result<Self, DeployError> {
        let path = artifacts_dir.join(format!("{contract}.json"));
        let raw = std::fs::read_to_string(&path).map_err(|e| DeployError::io(&path, e))?;
        Self::parse(contract, &path, &raw)
    }

    fn parse(contract: &str, path: &Path, raw: &str) -> Result<Self, DeployError> {
        let artifact: RawArtifact = serde_json::from_str(raw)
            .map_err(|e| DeployError::artifact(path, format!("malformed JSON: {e}")))?;
        if let Some(name) = &artifact.contract_name {
            if name != contract {
                return Err(DeployError::artifact(
                    path,
                    format!("holds contract `{name}`, expected `{contract}`"),
                ));
            }
        }

        let code = match artifact.bytecode {
            Some(RawBytecode::Hex(code)) | Some(RawBytecode::Object { object: code }) => code,
            None => return Err(DeployError::artifact(path, "no bytecode")),
        };
        let code = code.trim_start_matches("0x");
        if code.is_empty() {
            return Err(DeployError::artifact(path, "empty bytecode (abstract contract or interface?)"));
        }
        if code.contains("__") {
            return Err(DeployError::artifact(path, "bytecode has unlinked library references"));
        }
        let bytecode = hex::decode(code)
            .map_err(|e| DeployError::artifact(path, format!("bytecode is not hex: {e}")))?;

        let metadata = match artifact.metadata {
            Some(RawMetadata::Encoded(text)) if !text.is_empty() => Some(
                serde_json::from_str::<Metadata>(&text)
                    .map_err(|e| DeployError::artifact(path, format!("malformed metadata: {e}")))?,
            ),
            Some(RawMetadata::Decoded(metadata)) => Some(metadata),
            _ => None,
        };
        let compiler_version = artifact
            .compiler
            .map(|c| c.version)
            .or_else(|| metadata.as_ref().and_then(|m| m.compiler.as_ref()).map(|c| c.version.clone()));
        let optimizer = metadata.and_then(|m| m.settings).and_then(|s| s.optimizer);

        Ok(Self {
            contract: contract.to_string(),
            path: path.to_path_buf(),
            bytecode: bytecode.into(),
            compiler_version,
            optimizer,
        })
    }

    /// Fails unless the artifact was produced by the configured compiler.
    pub fn check_compiler(&self, solc: &SolcConfig) -> Result<(), DeployError> {
        let found = self
            .compiler_version
            .as_deref()
            .ok_or_else(|| DeployError::artifact(&self.path, "no compiler version recorded"))?;
        if !version_matches(&solc.version, found) {
            return Err(DeployError::CompilerMismatch {
                contract: self.contract.clone(),
                expected: format!("solc {}", solc.version),
                found: format!("solc {found}"),
            });
        }
        let expected = solc.settings.optimizer;
        if let Some(actual) = self.optimizer {
            // solc ignores `runs` when the optimizer is off
            let same = actual.enabled == expected.enabled
                && (!expected.enabled || actual.runs == expected.runs);
            if !same {
                return Err(DeployError::CompilerMismatch {
                    contract: self.contract.clone(),
                    expected: describe_optimizer(expected),
                    found: describe_optimizer(actual),
                });
            }
        }
        Ok(())
    }

    /// Bytecode followed by the ABI-encoded `(name, symbol)` constructor arguments.
    pub fn creation_code(&self, name: &str, symbol: &str) -> Bytes {
        let args = (name.to_string(), symbol.to_string()).abi_encode_params();
        let mut code = Vec::with_capacity(self.bytecode.len() + args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(&args);
        code.into()
    }
}

fn version_matches(expected: &str, found: &str) -> bool {
    let found = found.trim_start_matches('v');
    match found.strip_prefix(expected) {
        Some(rest) => rest.is_empty() || rest.starts_with('+'),
        None => false,
    }
}

fn describe_optimizer(optimizer: OptimizerConfig) -> String {
    if optimizer.enabled {
        format!("optimizer on ({} runs)", optimizer.runs)
    } else {
        "optimizer off".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolcSettings;

    fn solc(version: &str, enabled: bool, runs: u32) -> SolcConfig {
        SolcConfig {
            version: version.to_string(),
            settings: SolcSettings {
                optimizer: OptimizerConfig { enabled, runs },
            },
        }
    }

    fn truffle_artifact(bytecode: &str, version: &str, runs: u32) -> String {
        let metadata = format!(
            r#"{{"compiler":{{"version":"{version}"}},"settings":{{"optimizer":{{"enabled":true,"runs":{runs}}}}}}}"#
        );
        serde_json::json!({
            "contractName": "MintableERC20",
            "abi": [],
            "bytecode": bytecode,
            "compiler": { "name": "solc", "version": version },
            "metadata": metadata,
        })
        .to_string()
    }

    fn parse(raw: &str) -> Result<Artifact, DeployError> {
        Artifact::parse("MintableERC20", Path::new("MintableERC20.json"), raw)
    }

    #[test]
    fn test_truffle_artifact() {
        let artifact = parse(&truffle_artifact("0x6080604052", "0.8.15+commit.e14f2714", 200)).unwrap();
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(artifact.compiler_version.as_deref(), Some("0.8.15+commit.e14f2714"));
        assert_eq!(artifact.optimizer, Some(OptimizerConfig { enabled: true, runs: 200 }));
        artifact.check_compiler(&solc("0.8.15", true, 200)).unwrap();
    }

    #[test]
    fn test_foundry_artifact() {
        let raw = serde_json::json!({
            "bytecode": { "object": "0x6080" },
            "metadata": {
                "compiler": { "version": "0.8.15+commit.e14f2714" },
                "settings": { "optimizer": { "enabled": false, "runs": 200 } }
            }
        })
        .to_string();
        let artifact = parse(&raw).unwrap();
        assert_eq!(artifact.compiler_version.as_deref(), Some("0.8.15+commit.e14f2714"));
        artifact.check_compiler(&solc("0.8.15", false, 999)).unwrap();
    }

    #[test]
    fn test_compiler_version_mismatch() {
        let artifact = parse(&truffle_artifact("0x60", "0.8.19+commit.7dd6d404", 200)).unwrap();
        let err = artifact.check_compiler(&solc("0.8.15", true, 200)).unwrap_err();
        assert!(matches!(err, DeployError::CompilerMismatch { .. }));

        // 0.8.1 must not match 0.8.15
        let artifact = parse(&truffle_artifact("0x60", "0.8.15+commit.e14f2714", 200)).unwrap();
        assert!(artifact.check_compiler(&solc("0.8.1", true, 200)).is_err());
    }

    #[test]
    fn test_optimizer_mismatch() {
        let artifact = parse(&truffle_artifact("0x60", "0.8.15", 1000)).unwrap();
        let err = artifact.check_compiler(&solc("0.8.15", true, 200)).unwrap_err();
        assert!(err.to_string().contains("1000 runs"), "{err}");
        assert!(artifact.check_compiler(&solc("0.8.15", false, 200)).is_err());
    }

    #[test]
    fn test_rejects_unusable_bytecode() {
        for code in ["0x", "", "0x6080__$abc$__6080", "0xzz"] {
            let result = parse(&truffle_artifact(code, "0.8.15", 200));
            assert!(matches!(result, Err(DeployError::Artifact { .. })), "{code}");
        }
        let wrong = serde_json::json!({ "contractName": "Other", "bytecode": "0x60" }).to_string();
        assert!(parse(&wrong).is_err());
    }

    #[test]
    fn test_creation_code_appends_constructor_args() {
        let artifact = parse(&truffle_artifact("0x6080", "0.8.15", 200)).unwrap();
        let code = artifact.creation_code("Token B", "TOKENB");
        assert_eq!(&code[..2], &[0x60, 0x80]);
        let args = <(String, String)>::abi_decode_params(&code[2..]).unwrap();
        assert_eq!(args, ("Token B".to_string(), "TOKENB".to_string()));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("MintableERC20.json"),
            truffle_artifact("0x6080", "0.8.15", 200),
        )
        .unwrap();
        let artifact = Artifact::load(dir.path(), "MintableERC20").unwrap();
        assert_eq!(artifact.path, dir.path().join("MintableERC20.json"));
        assert!(matches!(
            Artifact::load(dir.path(), "Missing"),
            Err(DeployError::Io { .. })
        ));
    }
}
