//! `primegen run`

use anyhow::{Context, Result};
use primegen::{Generator, RuntimeConfig};
use tokio::sync::mpsc;
use tracing::info;

use super::LoadedConfig;
use crate::format::{format_event, format_summary};

/// Command-line overrides for a run
pub struct RunArgs {
  pub until: Option<String>,
  pub workers: Option<usize>,
  pub show_fails: bool,
}

/// Generate primes until ctrl-c or the ceiling
pub async fn cmd_run(loaded: LoadedConfig, args: RunArgs) -> Result<()> {
  let mut config = loaded.config;
  if let Some(until) = args.until {
    config.generation.until = Some(until);
  }
  if let Some(workers) = args.workers {
    config.pipeline.workers = workers;
  }
  if args.show_fails {
    config.generation.show_fails = true;
  }

  let runtime = RuntimeConfig::from_config(&config).context("Invalid configuration")?;
  info!(
    base_dir = %runtime.base_dir.display(),
    flush_threshold = runtime.flush_threshold(),
    "Shard directory"
  );
  let generator = Generator::new(runtime);

  // Print events as they arrive; the channel closes when the pipeline ends
  let (tx, mut rx) = mpsc::channel(256);
  let printer = tokio::spawn(async move {
    while let Some(event) = rx.recv().await {
      println!("{}", format_event(&event));
    }
  });

  let report = generator.run_until_signal(Some(tx)).await;
  printer.await.context("Event printer failed")?;

  let report = report.context("Generation failed")?;
  println!("{}", format_summary(&report));
  Ok(())
}
