//! `primegen count`

use anyhow::{Context, Result};
use primegen::{Generator, RuntimeConfig, config::Config};

use crate::format::format_shard_table;

/// Report the number of persisted primes
pub async fn cmd_count(config: &Config, json: bool, shards: bool) -> Result<()> {
  let runtime = RuntimeConfig::from_config(config).context("Invalid configuration")?;
  let generator = Generator::new(runtime);
  let summary = generator.summary().await.with_context(|| {
    format!(
      "Failed to read shard store {}",
      generator.runtime().base_dir.display()
    )
  })?;
  let count: u64 = summary.iter().map(|s| s.entries).sum();

  if json {
    let mut output = serde_json::json!({
      "count": count,
      "shards": summary.len(),
    });
    if shards {
      output["entries"] = summary
        .iter()
        .map(|s| serde_json::json!({ "id": s.id, "entries": s.entries }))
        .collect();
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    return Ok(());
  }

  if shards {
    println!("Index: {}", generator.index_path().display());
    println!();
    print!("{}", format_shard_table(&summary));
    println!();
    println!("Total: {} primes in {} shards", count, summary.len());
  } else {
    println!("{}", count);
  }

  Ok(())
}
