use anyhow::Result;
use clap::{Parser, Subcommand};

use copilot_usage::commands;
use copilot_usage::logging::init_logging;

#[derive(Parser)]
#[command(name = "copilot-usage")]
#[command(about = "Track GitHub Copilot premium request usage and spend from CLI logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive setup: plan, billing cycle day, log directory
    Setup,
    /// Scan Copilot CLI logs and cache usage data
    Scan {
        /// Re-parse all logs (clears the cache first)
        #[arg(long)]
        force: bool,
    },
    /// Show the usage dashboard (default command)
    Dashboard,
    /// Show a one-line usage status
    Status,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Dashboard) {
        Commands::Setup => commands::run_setup(),
        Commands::Scan { force } => commands::run_scan(force),
        Commands::Dashboard => commands::run_dashboard(),
        Commands::Status => commands::run_status(),
    }
}
