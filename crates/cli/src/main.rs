//! Dropwatch CLI - dropwatch command

use clap::{Parser, Subcommand};
use cli_lib::{cmd, logging, WatchArgs};
use std::process::ExitCode;

/// Dropwatch - run a handler once per burst of changes in a directory
#[derive(Parser)]
#[command(name = "dropwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter (e.g. info, debug); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and dispatch the handler (runs in the foreground)
    Run(WatchArgs),
    /// Print the resolved configuration without watching
    Config(WatchArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_level.as_deref()) {
        eprintln!("dropwatch: {:#}", e);
        return ExitCode::from(1);
    }

    let result = match &cli.command {
        Commands::Run(args) => cmd::run::run(args),
        Commands::Config(args) => cmd::config::run(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}
