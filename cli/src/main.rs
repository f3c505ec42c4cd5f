//! ChainScan CLI — scan contract events into a resumable state file.
//!
//! # Commands
//! ```
//! chainscan scan   --rpc-url <url> --state-file <path> [--address <addr>]... [--event <kind>]...
//! chainscan status --state-file <path>
//! chainscan info
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chainscan_core::config::ScannerConfig;
use chainscan_core::types::EventKind;

mod cmd_scan;
mod cmd_status;

#[derive(Parser)]
#[command(
    name = "chainscan",
    about = "Resumable, reorg-tolerant EVM event scanner — ChainScan CLI",
    long_about = "
ChainScan CLI: scan contract events from a JSON-RPC node into a JSON state file.
Interrupted scans resume from the last checkpoint; the trailing blocks of
every run are re-scanned to tolerate chain reorganizations.

ENVIRONMENT VARIABLES:
  CHAINSCAN_RPC_URL     JSON-RPC endpoint (same as --rpc-url)
  CHAINSCAN_STATE_FILE  State file path (same as --state-file)
  RUST_LOG              Log filter, e.g. chainscan_evm=debug
",
    version
)]
struct Cli {
    /// Enable debug logging (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan from the last checkpoint up to the chain head
    Scan(cmd_scan::ScanArgs),

    /// Show what a state file holds
    Status {
        /// Path to the state file
        #[arg(long, env = "CHAINSCAN_STATE_FILE", default_value = "scan-state.json")]
        state_file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show defaults and supported event kinds
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan(args) => cmd_scan::run(args).await,
        Commands::Status { state_file, json } => cmd_status::run(&state_file, json).await,
        Commands::Info => {
            cmd_info();
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_info() {
    let defaults = ScannerConfig::default();
    println!("ChainScan v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default max chunk scan size: {} blocks/call", defaults.max_chunk_scan_size);
    println!("  Default reorg safety margin: {} blocks", defaults.reorg_safety_blocks);
    println!("  Default end block buffer: {} blocks", defaults.end_block_buffer);
    println!("  Default flush interval: {}s", defaults.flush_interval_secs);
    println!("  Storage backends: JSON file, memory");
    println!("  Event kinds:");
    for kind in EventKind::ALL {
        println!("    {:<13} {}", kind.name(), kind.signature());
        println!("    {:<13} {:?}", "", kind.topic0());
    }
}
