//! # verify-proof Subcommand
//!
//! Checks every field proof in a JSON [`DocumentProof`] bundle against a
//! document root the operator obtained independently, usually from the
//! ledger.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use cdoc_core::Hash32;
use cdoc_document::{verify_field_proof, DocumentProof};

/// Arguments for `cdoc verify-proof`.
#[derive(Args, Debug)]
pub struct VerifyProofArgs {
    /// JSON proof bundle.
    #[arg(long)]
    pub proof: PathBuf,
    /// Expected document root, hex encoded.
    #[arg(long)]
    pub root: String,
}

/// Verify the bundle; exit code 1 if the root or any field fails.
pub fn run_verify_proof(args: &VerifyProofArgs) -> Result<u8> {
    let root = Hash32::from_hex(&args.root).context("invalid --root")?;
    let proof = load_proof(&args.proof)?;

    let mut failed = 0usize;
    if proof.document_root != root {
        println!(
            "FAIL: bundle was produced against {}, expected {root}",
            proof.document_root
        );
        failed += 1;
    }
    for field in &proof.fields {
        match verify_field_proof(field, &root) {
            Ok(()) => println!("OK:   {}", field.property),
            Err(e) => {
                println!("FAIL: {e}");
                failed += 1;
            }
        }
    }
    tracing::debug!(
        document_id = %proof.document_id,
        version = %proof.version,
        fields = proof.fields.len(),
        failed,
        "proof bundle checked"
    );
    Ok(if failed == 0 { 0 } else { 1 })
}

fn load_proof(path: &Path) -> Result<DocumentProof> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read proof: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse proof: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdoc_core::AccountId;
    use cdoc_crypto::Ed25519KeyPair;
    use cdoc_document::{CollaboratorsAccess, Document};
    use cdoc_schemes::Generic;

    fn bundle(dir: &Path) -> (PathBuf, Hash32) {
        let author = AccountId::random();
        let mut doc = Generic::create(author, &CollaboratorsAccess::default(), vec![]).unwrap();
        doc.sign(author, &Ed25519KeyPair::generate()).unwrap();
        let root = doc.calculate_document_root().unwrap();
        let proof = doc
            .create_proofs(&["generic.scheme", "cd_tree.document_identifier"])
            .unwrap();
        let path = dir.join("proof.json");
        std::fs::write(&path, serde_json::to_string_pretty(&proof).unwrap()).unwrap();
        (path, root)
    }

    #[test]
    fn valid_bundle_passes() {
        let dir = tempfile::tempdir().unwrap();
        let (proof, root) = bundle(dir.path());
        let args = VerifyProofArgs {
            proof,
            root: root.to_string(),
        };
        assert_eq!(run_verify_proof(&args).unwrap(), 0);
    }

    #[test]
    fn other_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (proof, _) = bundle(dir.path());
        let args = VerifyProofArgs {
            proof,
            root: Hash32::from_bytes([1; 32]).to_string(),
        };
        assert_eq!(run_verify_proof(&args).unwrap(), 1);
    }

    #[test]
    fn tampered_value_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (path, root) = bundle(dir.path());
        let mut proof = load_proof(&path).unwrap();
        proof.fields[0].value = b"forged".to_vec();
        std::fs::write(&path, serde_json::to_string(&proof).unwrap()).unwrap();
        let args = VerifyProofArgs {
            proof: path,
            root: root.to_string(),
        };
        assert_eq!(run_verify_proof(&args).unwrap(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let args = VerifyProofArgs {
            proof: PathBuf::from("/nonexistent/proof.json"),
            root: Hash32::from_bytes([0; 32]).to_string(),
        };
        assert!(run_verify_proof(&args).is_err());
    }
}
