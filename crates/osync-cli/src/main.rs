//! Osync CLI - Command-line interface for Osync
//!
//! Provides commands for:
//! - Serving a local library to the LAN
//! - Pulling a library from another machine
//! - Showing detected paths and the LAN address
//! - Managing configuration

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use osync_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod shutdown;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, info::InfoCommand,
    serve::ServeCommand, sync::SyncCommand, Context,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "osync", version, about = "Sync osu! libraries between machines on a LAN")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the local library to other machines
    Serve(ServeCommand),
    /// Pull missing files from a serving machine
    Sync(SyncCommand),
    /// Show the LAN address and detected library folders
    Info(InfoCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Filter directive from `-v`, falling back to the configured level.
fn log_filter(verbose: u8, quiet: bool, configured: &str) -> String {
    match verbose {
        0 if quiet => "warn".to_string(),
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    let filter = log_filter(cli.verbose, cli.quiet, &config.logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = Context {
        format,
        quiet: cli.quiet,
        config_path,
        config,
    };

    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(&ctx).await.map(|()| ExitCode::SUCCESS),
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Info(cmd) => cmd.execute(&ctx).await.map(|()| ExitCode::SUCCESS),
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await.map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            ctx.formatter().error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
