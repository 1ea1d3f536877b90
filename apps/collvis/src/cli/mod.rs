//! # Collvis CLI Module
//!
//! This module implements the CLI interface for Collvis.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `matrix` - Show the operation/strategy compatibility table
//! - `build` - Build a timeline and print a summary (or the full JSON)
//! - `inspect` - Query playback state at a time or progress fraction
//! - `utilization` - Bucket link utilization into windows
//! - `export` - Write a timeline to file (JSON or binary)
//! - `hash` - Fingerprint a timeline (FNV-1a and BLAKE3)

mod commands;

use clap::{Args, Parser, Subcommand};
use collvis_core::CollectiveError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Collvis - Collective Communication Visualizer
///
/// Synthesizes deterministic animation timelines for collective operations
/// (AllReduce, AllGather, ...) under different strategies and topologies.
#[derive(Parser, Debug)]
#[command(name = "collvis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// TOML file overriding timing parameters (falls back to COLLVIS_CONFIG)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// The (operation, strategy, topology) triple shared by timeline commands.
///
/// Names are matched case-insensitively and ignore `-`, `_` and spaces.
#[derive(Args, Debug, Clone)]
pub struct ScenarioArgs {
    /// Collective operation (allreduce, reduce, broadcast, allgather, reducescatter, alltoall)
    #[arg(short = 'O', long, default_value = "allreduce")]
    pub operation: String,

    /// Strategy (centralized, ring, bidi, singleshot, twophase)
    #[arg(short = 'S', long, default_value = "ring")]
    pub strategy: String,

    /// Topology (single8, dual16, demo4)
    #[arg(short = 'T', long, default_value = "single8")]
    pub topology: String,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show which strategies can execute which operations
    Matrix,

    /// Build a timeline and print its summary
    Build {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Print the complete timeline instead of a summary
        #[arg(long)]
        full: bool,
    },

    /// Show the playback state at a point in time
    Inspect {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Simulation time in ticks
        #[arg(long, conflicts_with = "progress")]
        at: Option<u64>,

        /// Playback position in parts per million of the duration
        #[arg(long)]
        progress: Option<u64>,
    },

    /// Show aggregate link utilization over fixed windows
    Utilization {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Number of windows
        #[arg(short, long, default_value = "50")]
        windows: usize,
    },

    /// Export a timeline to file
    Export {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (json, binary)
        #[arg(short = 't', long, default_value = "json")]
        format: String,
    },

    /// Fingerprint a timeline
    Hash {
        #[command(flatten)]
        scenario: ScenarioArgs,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), CollectiveError> {
    let config = load_timing_config(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    if cli.verbose {
        tracing::info!(?config, "Timing configuration");
    }

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(config, &host, port).await,
        Some(Commands::Matrix) | None => cmd_matrix(json_mode),
        Some(Commands::Build { scenario, full }) => cmd_build(&config, &scenario, json_mode, full),
        Some(Commands::Inspect {
            scenario,
            at,
            progress,
        }) => cmd_inspect(&config, &scenario, json_mode, at, progress),
        Some(Commands::Utilization { scenario, windows }) => {
            cmd_utilization(&config, &scenario, json_mode, windows)
        }
        Some(Commands::Export {
            scenario,
            output,
            format,
        }) => cmd_export(&config, &scenario, &output, &format),
        Some(Commands::Hash { scenario }) => cmd_hash(&config, &scenario, json_mode),
    }
}
