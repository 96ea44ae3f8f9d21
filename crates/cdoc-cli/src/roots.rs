//! # roots Subcommand
//!
//! Recomputes the data, signing and document roots of a packed document
//! (the JSON form nodes store and exchange) and prints them as JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use cdoc_core::{DocumentId, Hash32, VersionId};
use cdoc_document::{Document, PackedDocument, Status};
use cdoc_schemes::SchemeRegistry;

/// Arguments for `cdoc roots`.
#[derive(Args, Debug)]
pub struct RootsArgs {
    /// Packed document JSON.
    #[arg(long)]
    pub document: PathBuf,
}

/// Roots of one document version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootsReport {
    pub document_id: DocumentId,
    pub version: VersionId,
    pub scheme: String,
    pub status: Status,
    pub data_root: Hash32,
    pub signing_root: Hash32,
    /// Absent until the author has signed.
    pub document_root: Option<Hash32>,
    pub signatures: usize,
}

/// Print the roots report.
pub fn run_roots(args: &RootsArgs) -> Result<u8> {
    let report = compute_roots(&args.document)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(0)
}

/// Load a packed document and recompute its roots.
pub fn compute_roots(path: &Path) -> Result<RootsReport> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read document: {}", path.display()))?;
    let packed = PackedDocument::from_bytes(&bytes)
        .with_context(|| format!("not a packed document: {}", path.display()))?;
    let mut doc = SchemeRegistry::with_defaults()
        .unpack(packed)
        .context("failed to decode document")?;

    let data_root = doc.calculate_data_root()?;
    let signing_root = doc.calculate_signing_root()?;
    let document_root = match doc.calculate_document_root() {
        Ok(root) => Some(root),
        Err(e) => {
            tracing::debug!(error = %e, "document root not available");
            None
        }
    };
    Ok(RootsReport {
        document_id: doc.id(),
        version: doc.current_version(),
        scheme: doc.scheme().to_string(),
        status: doc.status(),
        data_root,
        signing_root,
        document_root,
        signatures: doc.core().signatures().len(),
    })
}
