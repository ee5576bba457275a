//! # mirel CLI Module
//!
//! Command-line surface over the snapshot file: `serve` runs the HTTP
//! API, while `status`, `load`, `apply`, `query`, `get`, and `export`
//! operate on the mirror in one shot and exit.

mod commands;

use crate::config::MirelConfig;
use clap::{Parser, Subcommand};
use mirel_core::MirelError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// ARGUMENTS
// =============================================================================

/// mirel - Link Graph Mirror
///
/// An in-memory mirror of a remote link graph, kept current by an ordered
/// event feed and queryable with recursive predicates.
#[derive(Parser, Debug)]
#[command(name = "mirel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip the startup banner
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the snapshot file
    #[arg(short = 'S', long, global = true, default_value = "mirel.snapshot")]
    pub snapshot: PathBuf,

    /// Path to the config file (defaults to mirel.toml if present)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand (defaults to `status`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// One subcommand per mirror operation.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Host to bind to (overrides config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show mirror status
    Status,

    /// Bulk load links from a JSON file, replacing the snapshot
    Load {
        /// Path to a JSON array of links
        file: PathBuf,
    },

    /// Apply change feed events from a JSON file
    Apply {
        /// Path to a JSON event object or array of events
        file: PathBuf,
    },

    /// Execute a predicate query
    Query {
        /// Predicate as JSON, e.g. '{"type_id": 3}'
        predicate: String,
    },

    /// Show one link with resolved references and adjacency
    Get {
        /// Link id
        id: u64,
    },

    /// Export the mirror in canonical snapshot format
    Export {
        /// Destination file
        output: PathBuf,
    },
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Dispatch the parsed command line.
pub async fn execute(cli: Cli) -> Result<(), MirelError> {
    let config = MirelConfig::load(cli.config.as_deref())?;
    let snapshot = cli.snapshot.as_path();
    let json_mode = cli.json;

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            cmd_serve(snapshot, &config, host.as_deref(), port).await
        }
        Some(Commands::Status) => cmd_status(snapshot, json_mode),
        Some(Commands::Load { file }) => cmd_load(snapshot, &file),
        Some(Commands::Apply { file }) => cmd_apply(snapshot, &file),
        Some(Commands::Query { predicate }) => cmd_query(snapshot, &predicate, json_mode),
        Some(Commands::Get { id }) => cmd_get(snapshot, id, json_mode),
        Some(Commands::Export { output }) => cmd_export(snapshot, &output),
        // Bare `mirel` behaves like `mirel status`.
        None => cmd_status(snapshot, json_mode),
    }
}
