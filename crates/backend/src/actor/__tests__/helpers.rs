//! Test helpers for pipeline integration tests.
//!
//! Provides `PipelineTestContext` which owns a temporary shard directory and
//! builds generators pointed at it.

use std::{path::PathBuf, time::Duration};

use num_bigint::BigUint;
use tempfile::TempDir;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
  actor::{message::PipelineEvent, pipeline::RetryConfig},
  generator::{GenerationReport, Generator, GeneratorError, RuntimeConfig},
  store::DIRECTORY_FILE,
};

/// Test context for pipeline integration tests.
pub struct PipelineTestContext {
  /// Temporary directory holding the shards
  pub data_dir: TempDir,
}

impl PipelineTestContext {
  pub fn new() -> Self {
    Self {
      data_dir: TempDir::new().expect("create data temp dir"),
    }
  }

  pub fn base_dir(&self) -> PathBuf {
    self.data_dir.path().join("primes")
  }

  /// Runtime config with a small flush threshold, one worker and a ceiling.
  ///
  /// A single worker makes arrival order ascending, so which values land in
  /// which shard is deterministic.
  pub fn runtime(&self, start: u32, threshold: u64, until: Option<u32>) -> RuntimeConfig {
    let mut runtime = RuntimeConfig::new(self.base_dir(), BigUint::from(start), threshold);
    runtime.pipeline.workers = 1;
    runtime.pipeline.candidate_buffer = 8;
    runtime.pipeline.evaluated_buffer = 8;
    runtime.pipeline.accepted_buffer = 8;
    runtime.pipeline.rejected_buffer = 8;
    runtime.pipeline.ceiling = until.map(BigUint::from);
    runtime.pipeline.retry = RetryConfig {
      max_retries: 1,
      initial_backoff: Duration::from_millis(1),
      max_backoff: Duration::from_millis(5),
      backoff_multiplier: 2.0,
      add_jitter: false,
    };
    runtime
  }

  pub fn generator(&self, start: u32, threshold: u64, until: u32) -> Generator {
    Generator::new(self.runtime(start, threshold, Some(until)))
  }

  /// Run a bounded generation to completion
  pub async fn run(&self, start: u32, threshold: u64, until: u32) -> GenerationReport {
    self
      .generator(start, threshold, until)
      .run(None, CancellationToken::new())
      .await
      .expect("generation should succeed")
  }

  /// Run `generator` while collecting every event it emits
  pub async fn run_collecting(
    &self,
    generator: &Generator,
  ) -> (Result<GenerationReport, GeneratorError>, Vec<PipelineEvent>) {
    let (tx, rx) = mpsc::channel(16);
    let collector = collect_events(rx);
    let result = generator.run(Some(tx), CancellationToken::new()).await;
    let events = collector.await.expect("event collector");
    (result, events)
  }

  pub async fn read_index(&self) -> String {
    tokio::fs::read_to_string(self.base_dir().join(DIRECTORY_FILE))
      .await
      .unwrap_or_default()
  }

  /// Raw lines of `<id>.txt`
  pub async fn read_shard(&self, id: u64) -> Vec<String> {
    let content = tokio::fs::read_to_string(self.base_dir().join(format!("{}.txt", id)))
      .await
      .expect("read shard");
    content.lines().map(str::to_string).collect()
  }

  /// Every persisted value, shard by shard in index order
  pub async fn read_all(&self) -> Vec<u64> {
    let mut values = Vec::new();
    for line in self.read_index().await.lines() {
      let id: u64 = line.parse().expect("shard id");
      for value in self.read_shard(id).await {
        values.push(value.parse().expect("shard value"));
      }
    }
    values
  }

  /// Write shard files and the index directly
  pub async fn seed(&self, shards: &[(u64, &str)]) {
    let base = self.base_dir();
    tokio::fs::create_dir_all(&base).await.expect("create base dir");

    let mut index = String::new();
    for (id, content) in shards {
      tokio::fs::write(base.join(format!("{}.txt", id)), content)
        .await
        .expect("write shard");
      index.push_str(&format!("{}\n", id));
    }
    tokio::fs::write(base.join(DIRECTORY_FILE), index)
      .await
      .expect("write index");
  }
}

/// Drain `rx` on a separate task until every sender is gone
pub fn collect_events(mut rx: mpsc::Receiver<PipelineEvent>) -> JoinHandle<Vec<PipelineEvent>> {
  tokio::spawn(async move {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
      events.push(event);
    }
    events
  })
}

/// Primes below `n` by trial division
pub fn primes_below(n: u64) -> Vec<u64> {
  (2..n)
    .filter(|&k| (2..k).take_while(|d| d * d <= k).all(|d| k % d != 0))
    .collect()
}

pub fn as_lines(values: &[u64]) -> Vec<String> {
  values.iter().map(u64::to_string).collect()
}
