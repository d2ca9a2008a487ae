//! Autocommit CLI - ac command

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::process::ExitCode;

mod cmd;
mod daemon;
mod locks;
mod logging;
mod notify;
mod util;

/// Autocommit - commits your work in the background
#[derive(Parser)]
#[command(name = "ac")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon
    Start {
        /// Run in foreground (for debugging)
        #[arg(long)]
        foreground: bool,

        /// Write logs to the daemon log file instead of stderr
        #[arg(long, hide = true)]
        log_file: bool,
    },
    /// Stop the daemon
    Stop,
    /// Enable or disable automatic commits in the running daemon
    Toggle,
    /// Commit now
    Run,
    /// Stage every change (git add -A)
    StageAll,
    /// Show daemon state, trigger rules and pending changes
    Status,
    /// Show the effective configuration
    Config {
        /// Print the config file locations only
        #[arg(long)]
        path: bool,

        /// Print an example configuration
        #[arg(long)]
        example: bool,

        /// Create the user config file if it does not exist
        #[arg(long)]
        create: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let daemon_log = matches!(cli.command, Commands::Start { log_file: true, .. });
    let default_level = match cli.command {
        Commands::Start { .. } => "info",
        _ => "warn",
    };

    // Held until exit so buffered log lines are flushed
    let _log_guard = match logging::init(default_level, daemon_log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Start { foreground, .. } => cmd::start::run(foreground).await,
        Commands::Stop => cmd::stop::run().await,
        Commands::Toggle => cmd::toggle::run().await,
        Commands::Run => cmd::run::run().await,
        Commands::StageAll => cmd::stage_all::run().await,
        Commands::Status => cmd::status::run().await,
        Commands::Config {
            path,
            example,
            create,
        } => cmd::config::run(path, example, create).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
