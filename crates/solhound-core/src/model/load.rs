use std::collections::HashSet;
use std::{fs, path::Path};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::model::ir::{ContractModel, NodeKind};
use crate::report::model::{ArtifactHash, ArtifactInfo};

/// Fatal model-loading failures.
///
/// All variants abort the run before any rule is evaluated; there are no
/// partial results for a model that failed to load or validate.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed contract model: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("inconsistent contract model: {0}")]
    Inconsistent(String),
}

/// Raw model-file context used during analysis.
///
/// Holds the exact bytes analyzed and a cryptographic fingerprint that
/// uniquely identifies the model snapshot.
#[derive(Debug, Clone)]
pub struct ModelContext {
    /// Optional source path (informational only).
    pub path: Option<String>,

    /// Exact bytes read from disk.
    pub bytes: Vec<u8>,

    /// Size of the model file in bytes.
    pub size_bytes: u64,

    /// Hash algorithm used for fingerprinting.
    pub hash_alg: String,

    /// Hex-encoded hash of the model bytes.
    pub hash_hex: String,
}

impl ModelContext {
    /// Convert into the public, report-facing artifact metadata.
    ///
    /// This intentionally drops raw bytes to prevent reuse after analysis.
    pub fn into_artifact(self) -> ArtifactInfo {
        ArtifactInfo {
            path: self.path,
            size_bytes: self.size_bytes,
            hash: ArtifactHash {
                algorithm: self.hash_alg,
                value: self.hash_hex,
            },
        }
    }
}

/// Read a contract-model file and compute a stable cryptographic identity.
///
/// The identity depends **only** on the file bytes. Filesystem metadata
/// (timestamps, permissions, etc.) is ignored to preserve deterministic
/// analysis results.
pub fn read_model(path: &Path) -> Result<ModelContext, ModelError> {
    let bytes = fs::read(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();

    Ok(ModelContext {
        path: Some(path.display().to_string()),
        size_bytes: bytes.len() as u64,
        bytes,
        hash_alg: "sha256".to_string(),
        hash_hex: hex::encode(digest),
    })
}

/// Deserialize the host front end's JSON model.
pub fn parse_model(bytes: &[u8]) -> Result<ContractModel, ModelError> {
    let model: ContractModel = serde_json::from_slice(bytes)?;
    Ok(model)
}

/// Check the model invariants the engine relies on.
///
/// - every modifier a function lists exists in the owning contract's
///   effective modifier set (declared, or declared by an inherited
///   contract present in the model);
/// - loop markers in each function body are balanced: an `end_loop` node
///   always closes a previously opened loop.
pub fn validate(model: &ContractModel) -> Result<(), ModelError> {
    for contract in &model.contracts {
        let effective = effective_modifiers(model, &contract.name);

        for function in &contract.functions {
            for modifier in &function.modifiers {
                if !effective.contains(modifier.as_str()) {
                    return Err(ModelError::Inconsistent(format!(
                        "function {}.{} lists unknown modifier `{}`",
                        contract.name,
                        function.signature_or_name(),
                        modifier
                    )));
                }
            }

            let mut open = 0usize;
            for (index, node) in function.nodes.iter().enumerate() {
                if node.opens_loop() {
                    open += 1;
                } else if node.kind == NodeKind::EndLoop {
                    open = open.checked_sub(1).ok_or_else(|| {
                        ModelError::Inconsistent(format!(
                            "function {}.{} has an unmatched end_loop at node {}",
                            contract.name,
                            function.signature_or_name(),
                            index
                        ))
                    })?;
                }
            }
        }
    }

    Ok(())
}

/// Modifier names visible on a contract: its own declarations plus those of
/// every inherited contract the model contains. Inherited contracts missing
/// from the model contribute nothing (the front end did not emit them).
fn effective_modifiers<'m>(model: &'m ContractModel, contract_name: &str) -> HashSet<&'m str> {
    let mut names = HashSet::new();
    let mut pending = vec![contract_name.to_string()];
    let mut seen = HashSet::new();

    while let Some(current) = pending.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }
        if let Some(contract) = model.contracts.iter().find(|c| c.name == current) {
            for modifier in &contract.modifiers {
                names.insert(modifier.name.as_str());
            }
            pending.extend(contract.inherits.iter().cloned());
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_model(data: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_bytes_and_computes_stable_hash() {
        let data = br#"{"contracts": []}"#;
        let file = temp_model(data);

        let ctx = read_model(file.path()).expect("model read succeeds");

        assert_eq!(ctx.bytes, data);
        assert_eq!(ctx.size_bytes, data.len() as u64);
        assert_eq!(ctx.hash_alg, "sha256");

        // Hashing the same bytes twice must agree.
        let again = read_model(file.path()).unwrap();
        assert_eq!(ctx.hash_hex, again.hash_hex);
    }

    #[test]
    fn different_inputs_produce_different_hashes() {
        let a = read_model(temp_model(b"{\"contracts\": []}").path()).unwrap();
        let b = read_model(temp_model(b"{\"contracts\":  []}").path()).unwrap();

        assert_ne!(a.hash_hex, b.hash_hex);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = read_model(Path::new("no_such_model.json"));
        assert!(matches!(result, Err(ModelError::Io { .. })));
    }

    #[test]
    fn malformed_json_is_fatal() {
        let result = parse_model(b"not a model");
        assert!(matches!(result, Err(ModelError::Malformed(_))));
    }

    #[test]
    fn empty_model_is_valid() {
        let model = parse_model(br#"{"contracts": []}"#).unwrap();
        assert!(validate(&model).is_ok());
    }

    #[test]
    fn unknown_modifier_fails_validation() {
        let model = parse_model(
            br#"{"contracts": [{
                "name": "Vault",
                "functions": [{"name": "sweep", "modifiers": ["onlyOwner"]}]
            }]}"#,
        )
        .unwrap();

        let err = validate(&model).unwrap_err();
        assert!(matches!(err, ModelError::Inconsistent(_)));
        assert!(err.to_string().contains("onlyOwner"));
    }

    #[test]
    fn inherited_modifiers_satisfy_validation() {
        let model = parse_model(
            br#"{"contracts": [
                {"name": "Ownable", "modifiers": [{"name": "onlyOwner"}]},
                {
                    "name": "Vault",
                    "inherits": ["Ownable"],
                    "functions": [{"name": "sweep", "modifiers": ["onlyOwner"]}]
                }
            ]}"#,
        )
        .unwrap();

        assert!(validate(&model).is_ok());
    }

    #[test]
    fn unmatched_end_loop_fails_validation() {
        let model = parse_model(
            br#"{"contracts": [{
                "name": "Vault",
                "functions": [{
                    "name": "drain",
                    "nodes": [{"kind": "end_loop", "text": ""}]
                }]
            }]}"#,
        )
        .unwrap();

        let err = validate(&model).unwrap_err();
        assert!(err.to_string().contains("unmatched end_loop"));
    }

    #[test]
    fn inheritance_cycles_do_not_hang_validation() {
        let model = parse_model(
            br#"{"contracts": [
                {"name": "A", "inherits": ["B"], "modifiers": [{"name": "guardA"}]},
                {
                    "name": "B",
                    "inherits": ["A"],
                    "functions": [{"name": "poke", "modifiers": ["guardA"]}]
                }
            ]}"#,
        )
        .unwrap();

        assert!(validate(&model).is_ok());
    }
}
