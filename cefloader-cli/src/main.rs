//! cefloader CLI - Command-line interface
//!
//! Downloads the Chromium Embedded Framework runtime from the CEF build CDN
//! and installs it into an application directory.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::app_name::AppNameArgs;
use commands::common::{load_config, TargetArgs};
use commands::config::ConfigCommands;
use commands::install::InstallArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "cefloader")]
#[command(author, version, about = "Download and install CEF runtimes")]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: <config dir>/cefloader/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download and install the CEF runtime
    Install(InstallArgs),

    /// Show the archive and URL that would be downloaded
    Resolve(TargetArgs),

    /// Write the application name into Info.plist (macOS)
    AppName(AppNameArgs),

    /// View or edit configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Install(args) => commands::install::run(args, &load_config(config_path)?),
        Commands::Resolve(target) => commands::resolve::run(target, &load_config(config_path)?),
        Commands::AppName(args) => commands::app_name::run(args),
        Commands::Config { command } => commands::config::run(command, config_path),
    }
}
