//! `primegen config show|init`

use anyhow::{Context, Result, bail};
use primegen::config::Config;

use super::LoadedConfig;

/// Show the effective configuration and the file it came from
pub async fn cmd_config_show(loaded: &LoadedConfig) -> Result<()> {
  match &loaded.path {
    Some(path) => println!("Using config: {}", path.display()),
    None if loaded.fallback.is_some() => println!("Using default configuration (config file failed to load)"),
    None => println!("Using default configuration (no config file found)"),
  }
  println!("Shard directory: {}", loaded.config.base_dir().display());
  println!();

  let toml_str = toml::to_string_pretty(&loaded.config)?;
  println!("{}", toml_str);

  Ok(())
}

/// Write the default template to the user config path
pub async fn cmd_config_init(force: bool) -> Result<()> {
  let config_path = Config::user_config_path();

  if config_path.exists() && !force {
    bail!(
      "Config file already exists: {} (use --force to overwrite)",
      config_path.display()
    );
  }

  if let Some(parent) = config_path.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("Failed to create {}", parent.display()))?;
  }

  tokio::fs::write(&config_path, Config::generate_template())
    .await
    .with_context(|| format!("Failed to write {}", config_path.display()))?;

  println!("Created config: {}", config_path.display());
  println!("Edit the file to customize settings.");

  Ok(())
}
