//! Generator lifecycle: recovery, pipeline, shutdown.
//!
//! # Lifecycle
//!
//! 1. Open the shard store and compute the resume state (fatal on failure)
//! 2. Create the master `CancellationToken`
//! 3. Run the pipeline with the store handed to the flusher
//! 4. On ctrl-c, cancel; the pipeline drains in-flight candidates and writes
//!    any partial buffer before returning

use std::path::PathBuf;

use num_bigint::BigUint;
use tokio::{signal, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
  actor::{
    message::PipelineEvent,
    pipeline::{PipelineConfig, PipelineError, PipelineResult, run_pipeline},
  },
  domain::{
    config::{Config, ConfigError},
    number::RunState,
  },
  store::{DIRECTORY_FILE, ShardStore, ShardSummary, StoreError},
};

// ============================================================================
// Configuration
// ============================================================================

/// Everything a run needs, resolved from the config file and CLI overrides.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Directory holding `directory.txt` and the shards
  pub base_dir: PathBuf,
  /// Value to begin at when the store is empty
  pub starting_value: BigUint,
  /// Upper bound on entries per shard
  pub max_shard_capacity: u64,
  pub pipeline: PipelineConfig,
}

impl RuntimeConfig {
  /// Resolve and validate a loaded config
  pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
    config.validate()?;

    Ok(Self {
      base_dir: config.base_dir(),
      starting_value: config.starting_prime()?,
      max_shard_capacity: config.storage.max_shard_capacity,
      pipeline: PipelineConfig::from_config(config, config.ceiling()?),
    })
  }

  /// Defaults with the given storage location and flush threshold
  pub fn new(base_dir: impl Into<PathBuf>, starting_value: BigUint, flush_threshold: u64) -> Self {
    Self {
      base_dir: base_dir.into(),
      starting_value,
      max_shard_capacity: flush_threshold.max(1),
      pipeline: PipelineConfig {
        flush_threshold,
        ..Default::default()
      },
    }
  }

  pub fn flush_threshold(&self) -> u64 {
    self.pipeline.flush_threshold
  }

  /// A flush always writes a whole block, so it must fit in one shard
  pub fn validate(&self) -> Result<(), ConfigError> {
    let threshold = self.flush_threshold();
    if threshold == 0 || threshold > self.max_shard_capacity {
      return Err(ConfigError::Invalid(format!(
        "flush threshold ({}) must be between 1 and the shard capacity ({})",
        threshold, self.max_shard_capacity
      )));
    }
    Ok(())
  }
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error("Startup recovery failed: {0}")]
  Recovery(#[from] StoreError),
  #[error(transparent)]
  Pipeline(#[from] PipelineError),
}

/// What a finished run did
#[derive(Debug, Clone)]
pub struct GenerationReport {
  /// Where the run started
  pub resumed: RunState,
  pub result: PipelineResult,
  /// Whether the run was stopped by cancellation rather than reaching its ceiling
  pub interrupted: bool,
}

impl GenerationReport {
  /// Primes persisted in total, this run included
  pub fn total_count(&self) -> u64 {
    self.resumed.historical_count + self.result.flushed.persisted
  }
}

/// The prime generator - recovers state and supervises one pipeline run.
///
/// # Usage
///
/// ```ignore
/// let generator = Generator::new(RuntimeConfig::from_config(&config)?);
/// let report = generator.run_until_signal(None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Generator {
  runtime: RuntimeConfig,
}

impl Generator {
  pub fn new(runtime: RuntimeConfig) -> Self {
    Self { runtime }
  }

  pub fn runtime(&self) -> &RuntimeConfig {
    &self.runtime
  }

  /// Location of the store's `directory.txt`
  pub fn index_path(&self) -> PathBuf {
    self.runtime.base_dir.join(DIRECTORY_FILE)
  }

  pub async fn open_store(&self) -> Result<ShardStore, GeneratorError> {
    Ok(ShardStore::open(&self.runtime.base_dir).await?)
  }

  /// Open the store and work out where the previous run left off
  pub async fn resume_state(&self) -> Result<(ShardStore, RunState), GeneratorError> {
    let store = self.open_store().await?;
    let state = store
      .resume(&self.runtime.starting_value, self.runtime.flush_threshold())
      .await?;
    Ok((store, state))
  }

  /// Primes persisted so far
  pub async fn count(&self) -> Result<u64, GeneratorError> {
    Ok(self.open_store().await?.count().await?)
  }

  /// Entry count per indexed shard
  pub async fn summary(&self) -> Result<Vec<ShardSummary>, GeneratorError> {
    Ok(self.open_store().await?.summary().await?)
  }

  /// Run the pipeline until the ceiling is reached or `cancel` fires.
  pub async fn run(
    &self,
    events: Option<mpsc::Sender<PipelineEvent>>,
    cancel: CancellationToken,
  ) -> Result<GenerationReport, GeneratorError> {
    self.runtime.validate()?;
    let (store, state) = self.resume_state().await?;

    info!(
      base_dir = %self.runtime.base_dir.display(),
      historical_count = state.historical_count,
      next_shard = state.next_shard_id,
      resume_value = %state.resume_value,
      from_disk = state.resumed_from_disk,
      workers = self.runtime.pipeline.workers,
      "Starting generation"
    );

    let result = run_pipeline(store, &state, self.runtime.pipeline.clone(), events, cancel.clone()).await?;
    let interrupted = cancel.is_cancelled();

    info!(
      tested = result.candidates_tested,
      persisted = result.flushed.persisted,
      total = state.historical_count + result.flushed.persisted,
      interrupted,
      "Generation stopped"
    );

    Ok(GenerationReport {
      resumed: state,
      result,
      interrupted,
    })
  }

  /// Run until ctrl-c (or the ceiling), then drain and return.
  pub async fn run_until_signal(
    &self,
    events: Option<mpsc::Sender<PipelineEvent>>,
  ) -> Result<GenerationReport, GeneratorError> {
    // Master cancellation token - propagates to the pipeline
    let cancel = CancellationToken::new();

    // Handle ctrl-c gracefully
    let cancel_for_signal = cancel.clone();
    let signal_handle = tokio::spawn(async move {
      if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        return;
      }
      info!("Received ctrl-c, draining pipeline...");
      cancel_for_signal.cancel();
    });

    let report = self.run(events, cancel).await;
    signal_handle.abort();
    report
  }
}
