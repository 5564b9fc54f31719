//! CLI command implementations

mod config;
mod count;
mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use primegen::config::{Config, ConfigError};
use tracing::warn;

pub use config::{cmd_config_init, cmd_config_show};
pub use count::cmd_count;
pub use run::{RunArgs, cmd_run};

/// The effective configuration and where it came from
pub struct LoadedConfig {
  pub config: Config,
  /// File the config was read from, `None` for built-in defaults
  pub path: Option<PathBuf>,
  /// Why the user config was ignored, if it was
  pub fallback: Option<ConfigError>,
}

impl LoadedConfig {
  /// Log a user config that failed to load. Called once logging is up.
  pub fn report_fallback(&self) {
    if let Some(e) = &self.fallback {
      warn!(error = %e, "Failed to load config, using defaults");
    }
  }
}

/// Load an explicit config file (errors are fatal) or the user config
/// (errors fall back to defaults).
pub async fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
  if let Some(path) = explicit {
    let config = Config::load_from(path)
      .await
      .with_context(|| format!("Failed to load config {}", path.display()))?;
    return Ok(LoadedConfig {
      config,
      path: Some(path.to_path_buf()),
      fallback: None,
    });
  }

  let path = Config::user_config_path();
  if !path.exists() {
    return Ok(LoadedConfig {
      config: Config::default(),
      path: None,
      fallback: None,
    });
  }

  Ok(match Config::load_from(&path).await {
    Ok(config) => LoadedConfig {
      config,
      path: Some(path),
      fallback: None,
    },
    Err(e) => LoadedConfig {
      config: Config::default(),
      path: None,
      fallback: Some(e),
    },
  })
}
