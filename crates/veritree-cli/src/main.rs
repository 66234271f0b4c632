//! Veritree CLI - command-line interface to the token trust engine
//!
//! A thin consumer of `veritree-core`: every command opens the store
//! directory, runs one operation, and prints the result. All trust logic
//! lives in the core crate.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use veritree_core::{NodeId, TokenNetwork, VerifyReport};

/// Veritree - hierarchical token trust engine
#[derive(Parser)]
#[command(name = "veritree")]
#[command(about = "Issue and verify hierarchically delegated trust tokens", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the token store directory
    #[arg(long, default_value = "./token_storage")]
    store_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the master (root) token for a new hierarchy
    CreateMaster {
        /// Master node identifier
        node_id: String,
    },

    /// Issue a token to a new node
    Issue {
        /// Node id of the token issuer
        issuer: String,

        /// Node id for the new token
        node_id: String,

        /// Optional token data payload
        #[arg(long)]
        data: Option<String>,
    },

    /// Verify a token
    Verify {
        /// Node id to verify
        node_id: String,

        /// Verification mode
        #[arg(long, value_enum, default_value = "chain")]
        mode: VerifyMode,
    },

    /// Verify that a token was issued, directly or transitively, by a node
    VerifyAsIssuer {
        /// Claimed issuer node id
        issuer_id: String,

        /// Descendant node id to verify
        descendant_id: String,
    },

    /// Show a token's full record
    Show {
        /// Node id to show
        node_id: String,
    },

    /// List all tokens in the store
    List,

    /// Print a node's public key PEM
    ExportKey {
        /// Node id whose public key to export
        node_id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum VerifyMode {
    /// Walk issuer links back to the root
    Chain,
    /// Check the master signature only
    Master,
    /// Run every applicable method
    Hybrid,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "veritree=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut network = TokenNetwork::open(&cli.store_dir)?;

    match cli.command {
        Commands::CreateMaster { node_id } => {
            let node_id = NodeId::parse(&node_id)?;
            let token = network.create_master(node_id.clone())?;
            println!("Master token created for node: {node_id}");
            println!("Token hash: {}", token.token_hash());
        }

        Commands::Issue {
            issuer,
            node_id,
            data,
        } => {
            let issuer = NodeId::parse(&issuer)?;
            let node_id = NodeId::parse(&node_id)?;
            let token = network.issue(&issuer, node_id.clone(), data)?;
            println!("Token issued to node: {node_id}");
            println!("Issued by: {issuer}");
            println!("Token hash: {}", token.token_hash());
        }

        Commands::Verify { node_id, mode } => {
            let node_id = NodeId::parse(&node_id)?;
            println!("Token verification for node: {node_id}");

            match mode {
                VerifyMode::Chain => {
                    let report = network.verify_chain(&node_id)?;
                    print_report("Verification chain", &report);
                }
                VerifyMode::Master => {
                    let report = network.verify_master_direct(&node_id)?;
                    print_report("Master direct verification", &report);
                }
                VerifyMode::Hybrid => {
                    let report = network.verify_hybrid(&node_id)?;
                    println!(
                        "Overall status: {}",
                        if report.valid { "VALID" } else { "INVALID" }
                    );
                    println!("\nVerification results by method:");
                    for (path, result) in &report.results {
                        println!(
                            "  {path}: {}",
                            if result.valid { "VALID" } else { "INVALID" }
                        );
                        for step in &result.trace {
                            println!("    - {step}");
                        }
                    }
                }
            }
        }

        Commands::VerifyAsIssuer {
            issuer_id,
            descendant_id,
        } => {
            let issuer_id = NodeId::parse(&issuer_id)?;
            let descendant_id = NodeId::parse(&descendant_id)?;
            let report = network.verify_as_issuer(&issuer_id, &descendant_id)?;
            println!("Issuer verification: {issuer_id} -> {descendant_id}");
            print_report("Verification path", &report);
        }

        Commands::Show { node_id } => {
            let node_id = NodeId::parse(&node_id)?;
            match network.get(&node_id) {
                Some(token) => {
                    println!("Token information for node: {node_id}");
                    println!("{}", serde_json::to_string_pretty(token)?);
                }
                None => anyhow::bail!("no token found for node: {node_id}"),
            }
        }

        Commands::List => {
            if network.is_empty() {
                println!("No tokens found in the store");
                return Ok(());
            }

            println!("Found {} tokens in the store:", network.len());
            println!("{}", "-".repeat(80));
            for token in network.list() {
                let kind = if token.is_root() { "MASTER" } else { "NODE" };
                println!("Node ID: {}", token.node_id());
                println!("Type: {kind}");
                println!("Token hash: {}", token.token_hash());
                if let Some(issuer) = token.issuer_id() {
                    println!("Issued by: {issuer}");
                }
                println!("Created: {}", token.timestamp());
                println!("{}", "-".repeat(80));
            }
        }

        Commands::ExportKey { node_id } => {
            let node_id = NodeId::parse(&node_id)?;
            match network.public_key_pem(&node_id) {
                Some(pem) => print!("{pem}"),
                None => anyhow::bail!("no public key material for node: {node_id}"),
            }
        }
    }

    Ok(())
}

fn print_report(heading: &str, report: &VerifyReport) {
    println!(
        "Status: {}",
        if report.valid { "VALID" } else { "INVALID" }
    );
    println!("\n{heading}:");
    for (i, step) in report.trace.iter().enumerate() {
        println!("  {}. {step}", i + 1);
    }
}
