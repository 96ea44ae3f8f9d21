//! # cdoc CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cdoc_cli::keys::{run_keygen, run_sign, run_verify, KeygenArgs, SignArgs, VerifyArgs};
use cdoc_cli::proof::{run_verify_proof, VerifyProofArgs};
use cdoc_cli::roots::{run_roots, RootsArgs};

/// Offline tooling for cdoc documents: keys, signatures, proofs and roots.
#[derive(Parser, Debug)]
#[command(name = "cdoc", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an Ed25519 key and write its seed to a file.
    Keygen(KeygenArgs),

    /// Sign a hex message with a key file.
    Sign(SignArgs),

    /// Verify an Ed25519 signature over a hex message.
    Verify(VerifyArgs),

    /// Verify a field proof bundle against a document root.
    VerifyProof(VerifyProofArgs),

    /// Recompute the roots of a packed document.
    Roots(RootsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Keygen(args) => run_keygen(&args),
        Commands::Sign(args) => run_sign(&args),
        Commands::Verify(args) => run_verify(&args),
        Commands::VerifyProof(args) => run_verify_proof(&args),
        Commands::Roots(args) => run_roots(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
