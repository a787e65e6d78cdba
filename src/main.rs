use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tickerbot::cli::setup::setup;
use tickerbot::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for tickerbot::AppCommand {
    fn from(cmd: Commands) -> tickerbot::AppCommand {
        match cmd {
            Commands::Run => tickerbot::AppCommand::Run,
            Commands::Status => tickerbot::AppCommand::Status,
            Commands::Wen => tickerbot::AppCommand::Wen,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Publish price status and answer messages typed on the console
    Run,
    /// Print the current status line once
    Status,
    /// Print the time until the remaining session events
    Wen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => tickerbot::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
