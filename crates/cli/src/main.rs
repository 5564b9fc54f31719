//! primegen CLI - continuous prime generation into sharded files

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

mod commands;
mod format;
mod logging;

use commands::{RunArgs, cmd_config_init, cmd_config_show, cmd_count, cmd_run, load_config};
use logging::init_logging;

#[derive(Parser)]
#[command(name = "primegen")]
#[command(about = "Discover prime numbers and persist them in ordered shard files")]
#[command(after_help = "\
QUICK START:
  primegen config init            # Write a default config file
  primegen run                    # Generate until ctrl-c
  primegen count                  # Primes persisted so far

A stopped run resumes from the last persisted prime.")]
struct Cli {
  /// Config file (default: <config_dir>/config.toml)
  #[arg(long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

/// Subcommands for `primegen config`
#[derive(Subcommand)]
pub enum ConfigCommand {
  /// Show current effective configuration
  #[command(long_about = "Show the current effective configuration.\n\n\
    Displays which config file is being used and its contents as TOML.")]
  Show,

  /// Write the default config template to the user config path
  Init {
    /// Overwrite an existing config file
    #[arg(long)]
    force: bool,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Generate primes until ctrl-c (or --until)
  #[command(after_help = "\
EXAMPLES:
  primegen run                    # Run until ctrl-c
  primegen run --until 1000000    # Stop before candidate 1000000
  primegen run --show-fails       # Also print rejected candidates")]
  Run {
    /// Stop before this candidate instead of running forever
    #[arg(long, value_name = "N")]
    until: Option<String>,
    /// Evaluator workers (default: config, 0 = one per CPU)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Print rejected candidates
    #[arg(long)]
    show_fails: bool,
  },
  /// Report the number of persisted primes
  Count {
    /// Output as JSON
    #[arg(long)]
    json: bool,
    /// List every shard with its entry count
    #[arg(long, visible_alias = "verbose")]
    shards: bool,
  },
  /// Manage configuration
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let Some(command) = cli.command else {
    Cli::command().print_help()?;
    return Ok(());
  };

  let loaded = load_config(cli.config.as_deref()).await?;
  let _guard = init_logging(&loaded.config.logging);
  loaded.report_fallback();

  match command {
    Commands::Run {
      until,
      workers,
      show_fails,
    } => {
      cmd_run(
        loaded,
        RunArgs {
          until,
          workers,
          show_fails,
        },
      )
      .await
    }
    Commands::Count { json, shards } => cmd_count(&loaded.config, json, shards).await,
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(&loaded).await,
      ConfigCommand::Init { force } => cmd_config_init(force).await,
    },
  }
}
