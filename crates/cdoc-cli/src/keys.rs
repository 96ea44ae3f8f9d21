//! # Key Subcommands
//!
//! Key files hold the 32-byte Ed25519 seed as hex on a single line.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use cdoc_crypto::{verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

use crate::decode_hex;

/// Arguments for `cdoc keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// File to write the seed to. Refuses to overwrite.
    #[arg(long)]
    pub out: PathBuf,
}

/// Arguments for `cdoc sign`.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Seed file written by `cdoc keygen`.
    #[arg(long)]
    pub key: PathBuf,
    /// Message to sign, hex encoded.
    #[arg(long)]
    pub message_hex: String,
}

/// Arguments for `cdoc verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Public key, hex encoded.
    #[arg(long)]
    pub public_key: String,
    /// Signed message, hex encoded.
    #[arg(long)]
    pub message_hex: String,
    /// Signature, hex encoded.
    #[arg(long)]
    pub signature: String,
}

/// Generate a key and write its seed to `args.out`.
pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let keys = keygen(&args.out)?;
    println!("OK: generated Ed25519 key");
    println!("  Seed file:  {}", args.out.display());
    println!("  Public key: {}", keys.public_key().to_hex());
    Ok(0)
}

/// Sign `args.message_hex` and print the signature.
pub fn run_sign(args: &SignArgs) -> Result<u8> {
    let keys = load_key(&args.key)?;
    let message = decode_hex(&args.message_hex).context("invalid --message-hex")?;
    println!("{}", keys.sign(&message).to_hex());
    Ok(0)
}

/// Verify a signature; exit code 1 if it does not hold.
pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let public_key = Ed25519PublicKey::from_hex(&args.public_key)
        .map_err(|e| anyhow::anyhow!("invalid --public-key: {e}"))?;
    let signature = Ed25519Signature::from_hex(&args.signature)
        .map_err(|e| anyhow::anyhow!("invalid --signature: {e}"))?;
    let message = decode_hex(&args.message_hex).context("invalid --message-hex")?;
    match verify_with_public_key(&message, &signature, &public_key) {
        Ok(()) => {
            println!("OK: signature is valid");
            Ok(0)
        }
        Err(e) => {
            println!("FAIL: {e}");
            Ok(1)
        }
    }
}

fn keygen(out: &Path) -> Result<Ed25519KeyPair> {
    if out.exists() {
        bail!("refusing to overwrite {}", out.display());
    }
    let keys = Ed25519KeyPair::generate();
    std::fs::write(out, hex::encode(keys.seed()))
        .with_context(|| format!("failed to write key: {}", out.display()))?;
    tracing::debug!(path = %out.display(), "key written");
    Ok(keys)
}

/// Read a seed file.
pub fn load_key(path: &Path) -> Result<Ed25519KeyPair> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key: {}", path.display()))?;
    let bytes = decode_hex(&raw).with_context(|| format!("malformed key file {}", path.display()))?;
    let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        anyhow::anyhow!("key must be 32 bytes (64 hex chars), got {} bytes", bytes.len())
    })?;
    Ok(Ed25519KeyPair::from_seed(&seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keygen_writes_seed_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.key");
        let keys = keygen(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.len(), 64);
        assert_eq!(load_key(&path).unwrap().public_key(), keys.public_key());

        assert!(keygen(&path).is_err());
    }

    #[test]
    fn sign_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k");
        let keys = keygen(&path).unwrap();
        let signature = load_key(&path).unwrap().sign(&[0xde, 0xad]);

        let ok = VerifyArgs {
            public_key: keys.public_key().to_hex(),
            message_hex: "dead".into(),
            signature: signature.to_hex(),
        };
        assert_eq!(run_verify(&ok).unwrap(), 0);

        let tampered = VerifyArgs {
            message_hex: "deaf".into(),
            ..ok
        };
        assert_eq!(run_verify(&tampered).unwrap(), 1);
    }

    #[test]
    fn short_key_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.key");
        std::fs::write(&path, "abcd").unwrap();
        assert!(load_key(&path).is_err());
    }
}
