//! # Collvis - Collective Communication Visualizer
//!
//! The main binary for the Collvis timeline engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based) serving timelines to renderers
//! - CLI interface for building, inspecting and exporting timelines
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │               apps/collvis (THE BINARY)           │
//! │                                                   │
//! │       ┌─────────────┐        ┌─────────────┐      │
//! │       │    CLI      │        │  HTTP API   │      │
//! │       │   (clap)    │        │   (axum)    │      │
//! │       └──────┬──────┘        └──────┬──────┘      │
//! │              └───────────┬──────────┘             │
//! │                          ▼                        │
//! │                  ┌───────────────┐                │
//! │                  │ collvis-core  │                │
//! │                  │ (THE ENGINE)  │                │
//! │                  └───────────────┘                │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! collvis server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! collvis matrix
//! collvis build -O allreduce -S ring -T dual16
//! collvis inspect -O allgather -S twophase --progress 500000
//! collvis export -O reducescatter -S bidi -o timeline.bin -t binary
//! ```

use clap::Parser;
use collvis::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // COLLVIS_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("COLLVIS_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "collvis=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Collvis startup banner.
fn print_banner() {
    println!(
        r#"
   ██████╗ ██████╗ ██╗     ██╗    ██╗   ██╗██╗███████╗
  ██╔════╝██╔═══██╗██║     ██║    ██║   ██║██║██╔════╝
  ██║     ██║   ██║██║     ██║    ██║   ██║██║███████╗
  ██║     ██║   ██║██║     ██║    ╚██╗ ██╔╝██║╚════██║
  ╚██████╗╚██████╔╝███████╗███████╗╚████╔╝ ██║███████║
   ╚═════╝ ╚═════╝ ╚══════╝╚══════╝ ╚═══╝  ╚═╝╚══════╝

  Collective Communication Visualizer v{}

  Ring • Centralized • In-Switch
"#,
        env!("CARGO_PKG_VERSION")
    );
}
