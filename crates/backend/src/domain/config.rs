//! Configuration system for primegen.
//!
//! A single TOML file at `<config_dir>/config.toml` (see [`crate::dirs`]).
//! Every section is optional; missing keys take their defaults.

use std::path::{Path, PathBuf};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use crate::dirs;

// ============================================================================
// Storage Configuration
// ============================================================================

/// Where shards live and how large they may grow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// Directory holding `directory.txt` and `<id>.txt` shards.
  /// Defaults to `<data_dir>/primes`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub base_dir: Option<PathBuf>,

  /// Upper bound on entries per shard (default: 10000000)
  pub max_shard_capacity: u64,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      base_dir: None,
      max_shard_capacity: 10_000_000,
    }
  }
}

// ============================================================================
// Generation Configuration
// ============================================================================

/// Candidate generation and primality settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
  /// Value to begin at when no shard exists yet (decimal, default: "1")
  pub starting_prime: String,

  /// Display rejected candidates (default: false)
  pub show_fails: bool,

  /// Miller-Rabin rounds per candidate (default: 20)
  pub rounds: u32,

  /// Stop before this candidate instead of running forever
  #[serde(skip_serializing_if = "Option::is_none")]
  pub until: Option<String>,
}

impl Default for GenerationConfig {
  fn default() -> Self {
    Self {
      starting_prime: "1".to_string(),
      show_fails: false,
      rounds: 20,
      until: None,
    }
  }
}

// ============================================================================
// Pipeline Configuration
// ============================================================================

/// Pipeline sizing (channel capacities, worker count, flush behaviour)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
  /// Accepted primes buffered before a shard write (default: 300)
  pub max_buffer_size: usize,

  /// Sequencer → Evaluator channel capacity (default: 100)
  pub candidate_buffer: usize,

  /// Evaluator → Router channel capacity (default: 100)
  pub evaluated_buffer: usize,

  /// Router → Flusher channel capacity (default: 100)
  pub accepted_buffer: usize,

  /// Router → Rejection reporter channel capacity (default: 100)
  pub rejected_buffer: usize,

  /// Evaluator workers, 0 = one per CPU (default: 0)
  pub workers: usize,

  /// Shard write attempts after the first failure (default: 3)
  pub flush_retries: u32,

  /// Initial backoff between shard write attempts in ms (default: 100)
  pub flush_backoff_ms: u64,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self {
      max_buffer_size: 300,
      candidate_buffer: 100,
      evaluated_buffer: 100,
      accepted_buffer: 100,
      rejected_buffer: 100,
      workers: 0,
      flush_retries: 3,
      flush_backoff_ms: 100,
    }
  }
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Log level: off, error, warn, info, debug, trace (default: info)
  pub level: String,

  /// Also write logs to a daily rolling file in the data directory
  pub file: bool,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: false,
    }
  }
}

// ============================================================================
// Root Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub storage: StorageConfig,
  pub generation: GenerationConfig,
  pub pipeline: PipelineSettings,
  pub logging: LoggingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("IO error reading {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Invalid TOML in {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
  #[error("Invalid integer for {field}: {value:?}")]
  InvalidInteger { field: &'static str, value: String },
  #[error("Invalid configuration: {0}")]
  Invalid(String),
}

impl Config {
  /// Get the user-level config path
  pub fn user_config_path() -> PathBuf {
    dirs::default_config_dir().join("config.toml")
  }

  /// Load a specific config file
  pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Base directory for shards, resolving the platform default
  pub fn base_dir(&self) -> PathBuf {
    self.storage.base_dir.clone().unwrap_or_else(dirs::default_shard_dir)
  }

  pub fn starting_prime(&self) -> Result<BigUint, ConfigError> {
    parse_biguint("generation.starting_prime", &self.generation.starting_prime)
  }

  pub fn ceiling(&self) -> Result<Option<BigUint>, ConfigError> {
    self
      .generation
      .until
      .as_deref()
      .map(|v| parse_biguint("generation.until", v))
      .transpose()
  }

  /// Check the invariants the pipeline relies on
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.starting_prime()?;
    self.ceiling()?;

    let threshold = self.pipeline.max_buffer_size;
    if threshold == 0 {
      return Err(ConfigError::Invalid("pipeline.max_buffer_size must be at least 1".into()));
    }
    if self.storage.max_shard_capacity == 0 {
      return Err(ConfigError::Invalid("storage.max_shard_capacity must be at least 1".into()));
    }
    if threshold as u64 > self.storage.max_shard_capacity {
      return Err(ConfigError::Invalid(format!(
        "pipeline.max_buffer_size ({}) exceeds storage.max_shard_capacity ({})",
        threshold, self.storage.max_shard_capacity
      )));
    }
    if self.generation.rounds == 0 {
      return Err(ConfigError::Invalid("generation.rounds must be at least 1".into()));
    }
    let buffers = [
      self.pipeline.candidate_buffer,
      self.pipeline.evaluated_buffer,
      self.pipeline.accepted_buffer,
      self.pipeline.rejected_buffer,
    ];
    if buffers.contains(&0) {
      return Err(ConfigError::Invalid("pipeline channel buffers must be at least 1".into()));
    }

    Ok(())
  }

  /// Generate a commented config template with the default values
  pub fn generate_template() -> String {
    let defaults = Self::default();
    format!(
      r#"# primegen configuration
# Place in {path}

# ============================================================================
# Storage
# ============================================================================

[storage]
# Directory for directory.txt and the <id>.txt shards (default: {base})
# base_dir = "/path/to/primes"

# Maximum number of primes per shard
max_shard_capacity = {capacity}

# ============================================================================
# Generation
# ============================================================================

[generation]
# Value to begin at when no shard exists yet
starting_prime = "{start}"

# Display rejected candidates while running
show_fails = {show_fails}

# Miller-Rabin rounds per candidate (1 = fastest, highest false-positive rate)
rounds = {rounds}

# Stop before this candidate instead of running forever
# until = "1000000"

# ============================================================================
# Pipeline
# ============================================================================

[pipeline]
# Primes buffered in memory before a shard write
max_buffer_size = {buffer}

# Channel capacities between stages
candidate_buffer = {candidate}
evaluated_buffer = {evaluated}
accepted_buffer = {accepted}
rejected_buffer = {rejected}

# Evaluator workers (0 = one per CPU)
workers = {workers}

# Shard write retries and initial backoff
flush_retries = {retries}
flush_backoff_ms = {backoff}

# ============================================================================
# Logging
# ============================================================================

[logging]
# off, error, warn, info, debug, trace (RUST_LOG overrides)
level = "{level}"

# Also log to a daily rolling file in the data directory
file = {file}
"#,
      path = Self::user_config_path().display(),
      base = dirs::default_shard_dir().display(),
      capacity = defaults.storage.max_shard_capacity,
      start = defaults.generation.starting_prime,
      show_fails = defaults.generation.show_fails,
      rounds = defaults.generation.rounds,
      buffer = defaults.pipeline.max_buffer_size,
      candidate = defaults.pipeline.candidate_buffer,
      evaluated = defaults.pipeline.evaluated_buffer,
      accepted = defaults.pipeline.accepted_buffer,
      rejected = defaults.pipeline.rejected_buffer,
      workers = defaults.pipeline.workers,
      retries = defaults.pipeline.flush_retries,
      backoff = defaults.pipeline.flush_backoff_ms,
      level = defaults.logging.level,
      file = defaults.logging.file,
    )
  }
}

fn parse_biguint(field: &'static str, value: &str) -> Result<BigUint, ConfigError> {
  value.trim().parse::<BigUint>().map_err(|_| ConfigError::InvalidInteger {
    field,
    value: value.to_string(),
  })
}
