//! Streaming pipeline for prime generation
//!
//! A multi-stage pipeline with backpressure:
//!
//! ```text
//!                                               ┌→ Flusher → ShardStore
//! Sequencer → Evaluators → Router ──────────────┤
//!    100        pool        100    100 accepted └→ Reporter
//!                                  100 rejected
//! ```
//!
//! Each stage has bounded channels. When downstream is full, upstream blocks,
//! naturally propagating backpressure through the pipeline.
//!
//! ## Shutdown
//!
//! Cancellation stops the sequencer only. Everything it already emitted is
//! tested, routed and (for primes) written, so a stopped run leaves no gap
//! between persisted values.

mod evaluator;
mod flusher;
mod reporter;
mod router;
mod sequencer;

use std::{sync::Arc, time::Duration};

use num_bigint::BigUint;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub use self::{
  flusher::{FlusherStats, RetryConfig},
  router::RouterStats,
};
use self::{
  evaluator::{evaluator_done_aggregator, evaluator_worker},
  flusher::{ShardSink, ShardWriter, flusher_stage},
  reporter::reporter_stage,
  router::router_stage,
  sequencer::{Sequencer, sequencer_stage},
};
use crate::{
  actor::message::PipelineEvent,
  context::primality::{DEFAULT_ROUNDS, PrimalityTest},
  domain::{config::Config, number::RunState},
  store::StoreError,
};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the generation pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
  // ========================================================================
  // Channel Buffer Sizes
  // ========================================================================
  /// Sequencer → Evaluator buffer size
  pub candidate_buffer: usize,

  /// Evaluator → Router buffer size
  pub evaluated_buffer: usize,

  /// Router → Flusher buffer size
  pub accepted_buffer: usize,

  /// Router → Reporter buffer size
  pub rejected_buffer: usize,

  // ========================================================================
  // Flushing
  // ========================================================================
  /// Accepted primes per shard write (the flush threshold)
  pub flush_threshold: u64,

  /// Retry policy for failed shard writes
  pub retry: RetryConfig,

  // ========================================================================
  // Evaluation
  // ========================================================================
  /// Number of evaluator workers (CPU-bound, default: num_cpus)
  pub workers: usize,

  /// Miller-Rabin rounds per candidate
  pub rounds: u32,

  /// Forward rejected candidates as events
  pub show_fails: bool,

  /// Stop before this candidate; `None` runs until cancelled
  pub ceiling: Option<BigUint>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      candidate_buffer: 100,
      evaluated_buffer: 100,
      accepted_buffer: 100,
      rejected_buffer: 100,
      flush_threshold: 300,
      retry: RetryConfig::default(),
      workers: num_cpus::get(),
      rounds: DEFAULT_ROUNDS,
      show_fails: false,
      ceiling: None,
    }
  }
}

impl PipelineConfig {
  /// Pipeline settings from a validated config
  pub fn from_config(config: &Config, ceiling: Option<BigUint>) -> Self {
    let settings = &config.pipeline;
    let workers = if settings.workers == 0 {
      num_cpus::get()
    } else {
      settings.workers
    };

    Self {
      candidate_buffer: settings.candidate_buffer,
      evaluated_buffer: settings.evaluated_buffer,
      accepted_buffer: settings.accepted_buffer,
      rejected_buffer: settings.rejected_buffer,
      flush_threshold: settings.max_buffer_size as u64,
      retry: RetryConfig::new(settings.flush_retries, Duration::from_millis(settings.flush_backoff_ms)),
      workers,
      rounds: config.generation.rounds,
      show_fails: config.generation.show_fails,
      ceiling,
    }
  }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the generation pipeline.
///
/// Creates all stages, connects them with channels, and runs until the
/// ceiling is reached or `cancel` fires and the in-flight work has drained.
/// The flusher owns `sink` for the duration of the run.
pub async fn run_pipeline<S>(
  sink: S,
  state: &RunState,
  config: PipelineConfig,
  events: Option<mpsc::Sender<PipelineEvent>>,
  cancel: CancellationToken,
) -> Result<PipelineResult, PipelineError>
where
  S: ShardSink + 'static,
{
  let workers = config.workers.max(1);
  debug!(
    workers,
    flush_threshold = config.flush_threshold,
    next_shard = state.next_shard_id,
    "Starting generation pipeline"
  );

  // Create channels between stages
  let (candidate_tx, candidate_rx) = mpsc::channel(config.candidate_buffer);
  let (evaluated_tx, evaluated_rx) = mpsc::channel(config.evaluated_buffer);
  let (accepted_tx, accepted_rx) = mpsc::channel(config.accepted_buffer);
  let (rejected_tx, rejected_rx) = mpsc::channel(config.rejected_buffer);

  // Wrap the candidate receiver in Arc<Mutex> for sharing among workers
  let candidate_rx = Arc::new(Mutex::new(candidate_rx));

  // Done signal channel for the worker pool
  let (done_tx, done_rx) = mpsc::channel::<()>(workers);

  // Create child cancellation token for this pipeline
  let pipeline_cancel = cancel.child_token();

  // Spawn sequencer stage
  let sequencer = Sequencer::new(state.first_candidate(), config.ceiling.clone());
  let sequencer_handle = tokio::spawn(sequencer_stage(sequencer, candidate_tx, pipeline_cancel.clone()));

  // Spawn evaluator workers
  let test = PrimalityTest::new(config.rounds);
  let mut evaluator_handles = Vec::with_capacity(workers);
  for worker_id in 0..workers {
    let rx = candidate_rx.clone();
    let tx = evaluated_tx.clone();
    let done_tx = done_tx.clone();
    evaluator_handles.push(tokio::spawn(evaluator_worker(worker_id, test, rx, tx, done_tx)));
  }
  drop(done_tx);
  drop(candidate_rx);

  // Spawn evaluator done aggregator
  tokio::spawn(evaluator_done_aggregator(workers, done_rx, evaluated_tx));

  // Spawn router and reporter
  let router_handle = tokio::spawn(router_stage(evaluated_rx, accepted_tx, rejected_tx));
  let reporter_handle = tokio::spawn(reporter_stage(rejected_rx, config.show_fails, events.clone()));

  // Run flusher stage in the current task (blocks until complete)
  let writer = ShardWriter::new(sink, state, config.flush_threshold, config.retry.clone());
  let flushed = flusher_stage(writer, accepted_rx, events, pipeline_cancel).await;

  // Upstream stages finish on their own once the flusher has returned,
  // either by draining or by seeing their downstream closed
  let emitted = sequencer_handle.await?;
  let mut tested = 0u64;
  let mut worker_error = None;
  for result in futures::future::join_all(evaluator_handles).await {
    match result? {
      Ok(count) => tested += count,
      Err(e) => {
        error!(error = %e, "Evaluator worker failed");
        worker_error.get_or_insert(e);
      }
    }
  }
  let routed = router_handle.await?;
  let reported = reporter_handle.await?;

  let flushed = flushed?;
  if let Some(e) = worker_error {
    return Err(e);
  }

  debug!(
    emitted,
    tested,
    accepted = routed.accepted,
    persisted = flushed.persisted,
    "Pipeline complete"
  );

  Ok(PipelineResult {
    candidates_emitted: emitted,
    candidates_tested: tested,
    routed,
    rejected_reported: reported,
    flushed,
  })
}

/// Tracks "Done" signals across multiple workers
#[derive(Debug)]
pub struct DoneTracker {
  expected: usize,
  received: usize,
}

impl DoneTracker {
  pub fn new(worker_count: usize) -> Self {
    Self {
      expected: worker_count,
      received: 0,
    }
  }

  /// Record a Done signal. Returns true if this was the last one.
  pub fn record_done(&mut self) -> bool {
    self.received += 1;
    self.received >= self.expected
  }
}

/// Result of running the pipeline
#[derive(Debug, Default, Clone)]
pub struct PipelineResult {
  pub candidates_emitted: u64,
  pub candidates_tested: u64,
  pub routed: RouterStats,
  pub rejected_reported: u64,
  pub flushed: FlusherStats,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
  #[error("Shard write failed after {attempts} attempt(s): {source}")]
  ShardWrite {
    attempts: u32,
    #[source]
    source: StoreError,
  },
  #[error("Pipeline task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}
