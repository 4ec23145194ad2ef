//! Harbor: vessel registry, berth bookings, and berth allocation workflow.
//!
//! # Usage
//!
//! ```text
//! harbor init
//! harbor vessel create|update|get|list|delete ...
//! harbor berth create|update|get|list|delete ...
//! harbor allocation request|approve|reject|cancel <vessel-id> [--approver <id>]
//! harbor allocation check [--repair] [--json]
//! harbor daemon start|stop|status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    allocation::AllocationCommand, berth::BerthCommand, daemon::DaemonCommand, init::InitArgs,
    vessel::VesselCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "harbor",
    version,
    about = "Register vessels and berth bookings and drive berth allocation",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision both stores and write a default config under ~/.harbor.
    Init(InitArgs),

    /// Manage vessel records.
    Vessel {
        #[command(subcommand)]
        command: VesselCommand,
    },

    /// Manage berth booking records.
    Berth {
        #[command(subcommand)]
        command: BerthCommand,
    },

    /// Advance allocation workflows and check for divergence.
    Allocation {
        #[command(subcommand)]
        command: AllocationCommand,
    },

    /// Run or query the allocation daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    if !matches!(cli.command, Commands::Daemon { .. }) {
        init_tracing();
    }
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Vessel { command } => commands::vessel::run(command),
        Commands::Berth { command } => commands::berth::run(command),
        Commands::Allocation { command } => commands::allocation::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}

/// Warnings and above to stderr unless `RUST_LOG` says otherwise.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
