//! End-to-end generation tests.
//!
//! Runs the full pipeline against a temporary shard directory and checks what
//! ends up on disk.

#[cfg(test)]
mod tests {
  use std::{collections::BTreeSet, time::Duration};

  use num_bigint::BigUint;
  use pretty_assertions::assert_eq;
  use tokio::sync::mpsc;
  use tokio_util::sync::CancellationToken;

  use crate::{
    actor::{
      __tests__::helpers::{PipelineTestContext, as_lines, primes_below},
      message::PipelineEvent,
    },
    generator::Generator,
  };

  /// Test: the first four primes fill shard 0 and nothing else is written.
  #[tokio::test]
  async fn test_first_shard_from_empty_store() {
    let ctx = PipelineTestContext::new();

    let report = ctx.run(1, 4, 9).await;

    assert_eq!(ctx.read_shard(0).await, as_lines(&[2, 3, 5, 7]));
    assert_eq!(ctx.read_index().await, "0\n");
    assert_eq!(report.result.flushed.persisted, 4);
    assert_eq!(report.result.flushed.next_shard_id, 4);
    assert_eq!(report.total_count(), 4);
    assert!(!report.interrupted);
  }

  /// Test: a second run resumes after 7 and writes into shard 4.
  #[tokio::test]
  async fn test_restart_resumes_from_last_prime() {
    let ctx = PipelineTestContext::new();
    ctx.run(1, 4, 9).await;

    let generator = ctx.generator(1, 4, 20);
    let (_, state) = generator.resume_state().await.unwrap();
    assert_eq!(state.resume_value, BigUint::from(7u32));
    assert_eq!(state.next_shard_id, 4);
    assert_eq!(state.historical_count, 4);
    assert!(state.resumed_from_disk);
    assert_eq!(generator.count().await.unwrap(), 4);

    let report = generator.run(None, CancellationToken::new()).await.unwrap();
    assert_eq!(report.result.candidates_emitted, 6); // 8 → 9, 11, 13, 15, 17, 19
    assert_eq!(ctx.read_shard(4).await, as_lines(&[11, 13, 17, 19]));
    assert_eq!(ctx.read_index().await, "0\n4\n");
    assert_eq!(generator.count().await.unwrap(), 8);
  }

  /// Test: with several workers every completed shard is sorted, holds exactly
  /// the threshold, and together the shards hold every prime below the ceiling.
  #[tokio::test]
  async fn test_parallel_workers_keep_shards_sorted() {
    let ctx = PipelineTestContext::new();
    let mut runtime = ctx.runtime(1, 10, Some(1000));
    runtime.pipeline.workers = 4;

    let report = Generator::new(runtime)
      .run(None, CancellationToken::new())
      .await
      .unwrap();

    let expected = primes_below(1000);
    assert_eq!(expected.len(), 168);
    assert_eq!(report.result.flushed.persisted, 168);
    assert_eq!(report.result.routed.accepted, 168);

    let index: Vec<u64> = ctx
      .read_index()
      .await
      .lines()
      .map(|l| l.parse().unwrap())
      .collect();
    assert_eq!(index, (0..=160).step_by(10).collect::<Vec<u64>>());

    let mut all = Vec::new();
    for &id in &index {
      let shard: Vec<u64> = ctx
        .read_shard(id)
        .await
        .iter()
        .map(|l| l.parse().unwrap())
        .collect();
      assert!(shard.windows(2).all(|w| w[0] < w[1]), "shard {} not sorted", id);
      if id < 160 {
        assert_eq!(shard.len(), 10, "shard {} incomplete", id);
      } else {
        assert_eq!(shard.len(), 8);
      }
      all.extend(shard);
    }

    all.sort_unstable();
    assert_eq!(all, expected);
  }

  /// Test: events report successes in arrival order, failures when asked, and
  /// one flush per shard write.
  #[tokio::test]
  async fn test_events_with_show_fails() {
    let ctx = PipelineTestContext::new();
    let mut runtime = ctx.runtime(1, 4, Some(10));
    runtime.pipeline.show_fails = true;

    let (result, events) = ctx.run_collecting(&Generator::new(runtime)).await;
    result.unwrap();

    let accepted: Vec<String> = events
      .iter()
      .filter_map(|e| match e {
        PipelineEvent::Accepted { value, .. } => Some(value.to_string()),
        _ => None,
      })
      .collect();
    let rejected: Vec<String> = events
      .iter()
      .filter_map(|e| match e {
        PipelineEvent::Rejected { value, .. } => Some(value.to_string()),
        _ => None,
      })
      .collect();
    let flushes: Vec<&PipelineEvent> = events
      .iter()
      .filter(|e| matches!(e, PipelineEvent::Flushed { .. }))
      .collect();

    assert_eq!(accepted, as_lines(&[2, 3, 5, 7]));
    assert_eq!(rejected, as_lines(&[9]));
    assert_eq!(
      flushes,
      vec![&PipelineEvent::Flushed {
        shard_id: 0,
        entries: 4,
        shard_len: 4
      }]
    );
  }

  /// Test: rejected values are not reported unless show_fails is set.
  #[tokio::test]
  async fn test_fails_hidden_by_default() {
    let ctx = PipelineTestContext::new();
    let generator = Generator::new(ctx.runtime(1, 4, Some(30)));

    let (result, events) = ctx.run_collecting(&generator).await;
    let report = result.unwrap();

    assert!(!events.iter().any(|e| matches!(e, PipelineEvent::Rejected { .. })));
    assert_eq!(report.result.rejected_reported, 0);
    assert!(report.result.routed.rejected > 0);
  }

  /// Test: stopping an unbounded run drains in-flight work and leaves the
  /// persisted primes contiguous, with no gap a restart would skip over.
  #[tokio::test]
  async fn test_cancel_leaves_no_gap() {
    let ctx = PipelineTestContext::new();
    let mut runtime = ctx.runtime(1, 8, None);
    runtime.pipeline.workers = 4;
    let generator = Generator::new(runtime);

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(16);

    // Cancel once the second shard is written, then keep draining events
    let watcher_cancel = cancel.clone();
    let watcher = tokio::spawn(async move {
      let mut flushes = 0;
      while let Some(event) = rx.recv().await {
        if let PipelineEvent::Flushed { .. } = event {
          flushes += 1;
          if flushes == 2 {
            watcher_cancel.cancel();
          }
        }
      }
      flushes
    });

    let report = tokio::time::timeout(Duration::from_secs(30), generator.run(Some(tx), cancel))
      .await
      .expect("pipeline should drain after cancel")
      .unwrap();
    let flushes = watcher.await.unwrap();

    assert!(report.interrupted);
    assert!(flushes >= 2);
    assert_eq!(report.result.candidates_tested, report.result.candidates_emitted);

    let mut persisted = ctx.read_all().await;
    persisted.sort_unstable();
    let max = *persisted.last().unwrap();
    assert_eq!(persisted, primes_below(max + 1));
    assert_eq!(persisted.len() as u64, report.total_count());

    // A restart picks up after the largest persisted value
    let (_, state) = generator.resume_state().await.unwrap();
    assert_eq!(state.historical_count, persisted.len() as u64);
    assert_eq!(state.next_shard_id, persisted.len() as u64 / 8 * 8);
    assert_eq!(state.resume_value, BigUint::from(max));
  }

  /// Test: the event stream may be dropped without stalling the run.
  #[tokio::test]
  async fn test_dropped_event_receiver() {
    let ctx = PipelineTestContext::new();
    let generator = ctx.generator(1, 4, 100);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let report = generator.run(Some(tx), CancellationToken::new()).await.unwrap();
    assert_eq!(report.result.flushed.persisted, 25);
    assert_eq!(report.result.flushed.shards, (0..25).step_by(4).collect::<BTreeSet<u64>>());
  }
}
