//! Flusher stage - buffers accepted primes and writes them to shards.
//!
//! The flusher is the single owner of the accepted buffer and the shard id
//! counter, and the only caller of the shard store's append. A flush therefore
//! never overlaps another and the id advances together with the write.

use std::{collections::BTreeSet, time::Duration};

use async_trait::async_trait;
use num_bigint::BigUint;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::PipelineError;
use crate::{
  actor::message::{PipelineEvaluated, PipelineEvent},
  domain::number::{EvaluatedNumber, RunState},
  store::{ShardStore, StoreError},
};

/// Destination for flushed buffers
#[async_trait]
pub trait ShardSink: Send {
  async fn append_to_shard(&mut self, id: u64, sorted_values: &[BigUint]) -> Result<(), StoreError>;
}

#[async_trait]
impl ShardSink for ShardStore {
  async fn append_to_shard(&mut self, id: u64, sorted_values: &[BigUint]) -> Result<(), StoreError> {
    ShardStore::append_to_shard(self, id, sorted_values).await
  }
}

/// Backoff between shard write attempts
#[derive(Debug, Clone)]
pub struct RetryConfig {
  /// Attempts after the first failure
  pub max_retries: u32,
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
  /// Backoff multiplier (exponential factor)
  pub backoff_multiplier: f64,
  /// Whether to add up to 25% jitter
  pub add_jitter: bool,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      initial_backoff: Duration::from_millis(100),
      max_backoff: Duration::from_secs(5),
      backoff_multiplier: 2.0,
      add_jitter: true,
    }
  }
}

impl RetryConfig {
  pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
    Self {
      max_retries,
      initial_backoff,
      ..Default::default()
    }
  }

  /// Calculate backoff duration for a given attempt
  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
    let mut backoff = Duration::from_secs_f64(base.min(self.max_backoff.as_secs_f64()));

    if self.add_jitter {
      let jitter_factor = 1.0 + rand::thread_rng().gen_range(0.0..0.25);
      backoff = Duration::from_secs_f64(backoff.as_secs_f64() * jitter_factor);
    }

    backoff.min(self.max_backoff)
  }
}

/// One successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushOutcome {
  pub shard_id: u64,
  /// The written values, in arrival order
  pub flushed: Vec<EvaluatedNumber>,
  /// Entries in the shard after the write
  pub shard_len: u64,
}

/// Accepted buffer plus the shard id counter.
#[derive(Debug)]
pub struct ShardWriter<S> {
  sink: S,
  threshold: u64,
  retry: RetryConfig,
  buffer: Vec<EvaluatedNumber>,
  shard_id: u64,
  /// Entries already in the shard at `shard_id`
  shard_fill: u64,
}

impl<S: ShardSink> ShardWriter<S> {
  pub fn new(sink: S, state: &RunState, threshold: u64, retry: RetryConfig) -> Self {
    Self {
      sink,
      threshold: threshold.max(1),
      retry,
      buffer: Vec::new(),
      shard_id: state.next_shard_id,
      shard_fill: state.current_shard_fill,
    }
  }

  pub fn shard_id(&self) -> u64 {
    self.shard_id
  }

  #[cfg(test)]
  pub fn buffered(&self) -> usize {
    self.buffer.len()
  }

  #[cfg(test)]
  pub fn sink(&self) -> &S {
    &self.sink
  }

  /// Buffer length that triggers the next flush.
  ///
  /// This is the threshold, except when the current shard was left partially
  /// filled by an earlier run, in which case only the missing entries are
  /// buffered so the shard completes at exactly the threshold.
  pub fn flush_target(&self) -> usize {
    self.threshold.saturating_sub(self.shard_fill).max(1) as usize
  }

  /// Buffer `number`, flushing and advancing the shard id once the buffer is full
  pub async fn push(&mut self, number: EvaluatedNumber) -> Result<Option<FlushOutcome>, PipelineError> {
    self.buffer.push(number);
    if self.buffer.len() >= self.flush_target() {
      return self.flush(true).await.map(Some);
    }
    Ok(None)
  }

  /// Write whatever is buffered into the current shard without advancing the id
  pub async fn finish(&mut self) -> Result<Option<FlushOutcome>, PipelineError> {
    if self.buffer.is_empty() {
      return Ok(None);
    }
    self.flush(false).await.map(Some)
  }

  async fn flush(&mut self, complete: bool) -> Result<FlushOutcome, PipelineError> {
    let mut sorted: Vec<BigUint> = self.buffer.iter().map(|n| n.value.clone()).collect();
    sorted.sort_unstable();

    let shard_id = self.shard_id;
    self.write_with_retry(shard_id, &sorted).await?;

    let shard_len = self.shard_fill + sorted.len() as u64;
    if complete {
      self.shard_id += self.threshold;
      self.shard_fill = 0;
    } else {
      self.shard_fill = shard_len;
    }

    trace!(shard = shard_id, entries = sorted.len(), shard_len, complete, "Flushed buffer");
    Ok(FlushOutcome {
      shard_id,
      flushed: std::mem::take(&mut self.buffer),
      shard_len,
    })
  }

  /// The buffer is left untouched until a write succeeds.
  async fn write_with_retry(&mut self, id: u64, values: &[BigUint]) -> Result<(), PipelineError> {
    let mut attempt = 0u32;
    loop {
      match self.sink.append_to_shard(id, values).await {
        Ok(()) => return Ok(()),
        Err(e) if attempt < self.retry.max_retries => {
          let backoff = self.retry.backoff_for_attempt(attempt);
          warn!(
            shard = id,
            attempt = attempt + 1,
            backoff_ms = backoff.as_millis() as u64,
            error = %e,
            "Shard write failed, retrying"
          );
          tokio::time::sleep(backoff).await;
          attempt += 1;
        }
        Err(e) => {
          error!(shard = id, attempts = attempt + 1, error = %e, "Shard write failed, giving up");
          return Err(PipelineError::ShardWrite {
            attempts: attempt + 1,
            source: e,
          });
        }
      }
    }
  }
}

/// Stats returned by the flusher stage
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlusherStats {
  /// Primes written during this run
  pub persisted: u64,
  pub flushes: u64,
  /// Shards written to during this run
  pub shards: BTreeSet<u64>,
  /// Shard the next run starts in
  pub next_shard_id: u64,
}

impl FlusherStats {
  fn record(&mut self, outcome: &FlushOutcome) {
    self.persisted += outcome.flushed.len() as u64;
    self.flushes += 1;
    self.shards.insert(outcome.shard_id);
  }
}

/// Flusher stage - consumes the accepted queue until it closes.
///
/// Input is drained even after cancellation so every tested prime is written.
/// A write that still fails after its retries cancels the pipeline and is
/// returned as the stage's error.
pub async fn flusher_stage<S: ShardSink>(
  mut writer: ShardWriter<S>,
  mut rx: mpsc::Receiver<PipelineEvaluated>,
  mut events: Option<mpsc::Sender<PipelineEvent>>,
  cancel: CancellationToken,
) -> Result<FlusherStats, PipelineError> {
  debug!(
    shard = writer.shard_id(),
    flush_target = writer.flush_target(),
    "Flusher stage starting"
  );
  let mut stats = FlusherStats::default();

  loop {
    let flushed = match rx.recv().await {
      Some(PipelineEvaluated::Number(number)) => writer.push(number).await,
      Some(PipelineEvaluated::Done) | None => break,
    };

    match flushed {
      Ok(Some(outcome)) => {
        stats.record(&outcome);
        notify(&mut events, &outcome).await;
      }
      Ok(None) => {}
      Err(e) => {
        cancel.cancel();
        return Err(e);
      }
    }
  }

  match writer.finish().await {
    Ok(Some(outcome)) => {
      debug!(shard = outcome.shard_id, entries = outcome.flushed.len(), "Flushed partial buffer");
      stats.record(&outcome);
      notify(&mut events, &outcome).await;
    }
    Ok(None) => {}
    Err(e) => {
      cancel.cancel();
      return Err(e);
    }
  }

  stats.next_shard_id = writer.shard_id();
  debug!(
    persisted = stats.persisted,
    flushes = stats.flushes,
    next_shard = stats.next_shard_id,
    "Flusher stage complete"
  );
  Ok(stats)
}

/// Send `Accepted` for each written value in arrival order, then `Flushed`
async fn notify(events: &mut Option<mpsc::Sender<PipelineEvent>>, outcome: &FlushOutcome) {
  let Some(tx) = events else {
    return;
  };

  let batch = outcome
    .flushed
    .iter()
    .map(PipelineEvent::accepted)
    .chain(std::iter::once(PipelineEvent::Flushed {
      shard_id: outcome.shard_id,
      entries: outcome.flushed.len(),
      shard_len: outcome.shard_len,
    }));

  for event in batch {
    if tx.send(event).await.is_err() {
      debug!("Flusher: event receiver closed");
      *events = None;
      return;
    }
  }
}
