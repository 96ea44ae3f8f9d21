//! # cdoc-cli: Operator Tool
//!
//! Offline helpers for the `cdoc` binary. Nothing here talks to a node.
//!
//! ## Subcommands
//!
//! - `cdoc keygen`: generate an Ed25519 key.
//! - `cdoc sign` / `cdoc verify`: sign or verify a hex message.
//! - `cdoc verify-proof`: check a field proof bundle against a root.
//! - `cdoc roots`: recompute the roots of a packed document.
//!
//! ```bash
//! cdoc keygen --out alice.key
//! cdoc sign --key alice.key --message-hex 0xdeadbeef
//! cdoc verify-proof --proof proof.json --root 0x5c1e…
//! cdoc roots --document invoice.json
//! ```
//!
//! Handlers return the process exit code: `0` on success, `1` when a
//! check fails. Errors reading input are returned as `anyhow` errors.

pub mod keys;
pub mod proof;
pub mod roots;

use anyhow::{Context, Result};

/// Parse hex with or without a `0x` prefix.
pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(digits).with_context(|| format!("invalid hex {trimmed:?}"))
}
