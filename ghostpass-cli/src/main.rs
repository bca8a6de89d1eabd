mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use error::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red(), e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so `--json` output stays parseable. `RUST_LOG` wins
/// over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Keygen { out, force } => commands::handle_keygen(out, force, cli.json),
        Commands::Issue {
            subject,
            permissions,
            payload_only,
            authority,
        } => commands::handle_issue(subject, permissions, payload_only, authority, cli.json).await,
        Commands::Present {
            subject,
            permissions,
            rotations,
            authority,
        } => commands::handle_present(subject, permissions, rotations, authority, cli.json).await,
        Commands::Scan {
            payload,
            bell,
            authority,
        } => commands::handle_scan(payload, bell, authority, cli.json).await,
        Commands::Verify {
            token,
            public_key,
            public_key_file,
        } => commands::handle_verify(token, public_key, public_key_file, cli.json),
        Commands::Config { command } => commands::handle_config(command, cli.json),
    }
}
