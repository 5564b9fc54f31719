//! Recovery and failure tests.
//!
//! Covers resuming into a partial shard, falling back from unreadable state,
//! and giving up on a shard that cannot be written.

#[cfg(test)]
mod tests {
  use num_bigint::BigUint;
  use pretty_assertions::assert_eq;
  use tokio_util::sync::CancellationToken;

  use crate::{
    actor::{
      __tests__::helpers::{PipelineTestContext, as_lines, primes_below},
      pipeline::PipelineError,
    },
    domain::config::ConfigError,
    generator::{Generator, GeneratorError},
    store::{ShardSummary, StoreError},
  };

  /// Test: a run that stops mid-shard leaves a partial shard, and the next run
  /// tops it up to the threshold before moving on.
  #[tokio::test]
  async fn test_partial_shard_is_completed_by_next_run() {
    let ctx = PipelineTestContext::new();

    let first = ctx.run(1, 4, 12).await;
    assert_eq!(first.result.flushed.next_shard_id, 4);
    assert_eq!(ctx.read_shard(4).await, as_lines(&[11]));
    assert_eq!(ctx.read_index().await, "0\n4\n");

    let generator = ctx.generator(1, 4, 30);
    let (_, state) = generator.resume_state().await.unwrap();
    assert_eq!(state.historical_count, 5);
    assert_eq!(state.next_shard_id, 4);
    assert_eq!(state.current_shard_fill, 1);
    assert_eq!(state.resume_value, BigUint::from(11u32));

    let second = generator.run(None, CancellationToken::new()).await.unwrap();
    assert_eq!(second.result.flushed.shards.iter().copied().collect::<Vec<_>>(), vec![4, 8]);
    assert_eq!(ctx.read_shard(4).await, as_lines(&[11, 13, 17, 19]));
    assert_eq!(ctx.read_shard(8).await, as_lines(&[23, 29]));
    assert_eq!(ctx.read_index().await, "0\n4\n8\n");
    assert_eq!(generator.count().await.unwrap(), 10);
  }

  /// Test: an unparsable last value restarts from the configured start.
  #[tokio::test]
  async fn test_malformed_resume_value_uses_configured_start() {
    let ctx = PipelineTestContext::new();
    ctx.seed(&[(0, "2\n3\n5\nseven\n")]).await;

    let generator = ctx.generator(100, 4, 110);
    let (_, state) = generator.resume_state().await.unwrap();
    assert!(!state.resumed_from_disk);
    assert_eq!(state.resume_value, BigUint::from(100u32));
    assert_eq!(state.next_shard_id, 4);

    generator.run(None, CancellationToken::new()).await.unwrap();
    assert_eq!(ctx.read_shard(4).await, as_lines(&[101, 103, 107, 109]));
  }

  /// Test: a remainder drained below an earlier shard's maximum does not pull
  /// the next run back over primes that are already persisted.
  #[tokio::test]
  async fn test_resume_after_out_of_order_drain_persists_no_duplicates() {
    let ctx = PipelineTestContext::new();
    // 11 was flushed before 7 finished, and 7 was drained into shard 4
    ctx.seed(&[(0, "2\n3\n5\n11\n"), (4, "7\n")]).await;

    let generator = ctx.generator(1, 4, 20);
    let (_, state) = generator.resume_state().await.unwrap();
    assert_eq!(state.resume_value, BigUint::from(11u32));

    generator.run(None, CancellationToken::new()).await.unwrap();
    assert_eq!(ctx.read_shard(4).await, as_lines(&[7, 13, 17, 19]));

    let mut persisted = ctx.read_all().await;
    persisted.sort_unstable();
    assert_eq!(persisted, primes_below(20));
    assert_eq!(generator.count().await.unwrap(), 8);
  }

  /// Test: restarting from the configured start leaves a partial shard alone
  /// and writes into the next block.
  #[tokio::test]
  async fn test_configured_restart_keeps_partial_shard_ascending() {
    let ctx = PipelineTestContext::new();
    ctx.seed(&[(0, "2\n3\nseven\n")]).await;

    let generator = ctx.generator(1, 4, 6);
    let (_, state) = generator.resume_state().await.unwrap();
    assert!(!state.resumed_from_disk);
    assert_eq!(state.next_shard_id, 4);
    assert_eq!(state.current_shard_fill, 0);

    generator.run(None, CancellationToken::new()).await.unwrap();
    assert_eq!(ctx.read_shard(0).await, vec!["2", "3", "seven"]);
    assert_eq!(ctx.read_shard(4).await, as_lines(&[2, 3, 5]));
    assert_eq!(ctx.read_index().await, "0\n4\n");

    assert_eq!(generator.index_path(), ctx.base_dir().join("directory.txt"));
    assert_eq!(
      generator.summary().await.unwrap(),
      vec![ShardSummary { id: 0, entries: 3 }, ShardSummary { id: 4, entries: 3 }]
    );
  }

  /// Test: a flush threshold larger than the shard capacity is rejected
  /// before anything is written.
  #[tokio::test]
  async fn test_threshold_above_capacity_is_rejected() {
    let ctx = PipelineTestContext::new();
    let mut runtime = ctx.runtime(1, 8, Some(50));
    runtime.max_shard_capacity = 4;
    let generator = Generator::new(runtime);

    let err = generator.run(None, CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, GeneratorError::Config(ConfigError::Invalid(_))));
    assert_eq!(ctx.read_index().await, "");
  }

  /// Test: a configured start that is itself prime is tested, not skipped.
  #[tokio::test]
  async fn test_configured_start_is_inclusive() {
    let ctx = PipelineTestContext::new();

    ctx.run(101, 4, 110).await;
    assert_eq!(ctx.read_shard(0).await, as_lines(&[101, 103, 107, 109]));
  }

  /// Test: an indexed shard that is missing stops startup.
  #[tokio::test]
  async fn test_missing_shard_fails_recovery() {
    let ctx = PipelineTestContext::new();
    ctx.seed(&[(0, "2\n3\n5\n7\n")]).await;
    tokio::fs::write(ctx.base_dir().join("directory.txt"), "0\n4\n")
      .await
      .unwrap();

    let generator = ctx.generator(1, 4, 20);
    let err = generator.run(None, CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
      err,
      GeneratorError::Recovery(StoreError::ShardRead { id: 4, .. })
    ));
    assert!(generator.count().await.is_err());
  }

  /// Test: a shard that cannot be written is retried, then reported as fatal.
  #[tokio::test]
  async fn test_unwritable_shard_is_fatal() {
    let ctx = PipelineTestContext::new();
    // A directory where shard 0 should go makes every open fail
    tokio::fs::create_dir_all(ctx.base_dir().join("0.txt")).await.unwrap();

    let mut runtime = ctx.runtime(1, 4, Some(50));
    runtime.pipeline.workers = 2;
    let generator = Generator::new(runtime);

    let (result, _) = ctx.run_collecting(&generator).await;
    let err = result.unwrap_err();
    assert!(matches!(
      err,
      GeneratorError::Pipeline(PipelineError::ShardWrite { attempts: 2, .. })
    ));
    assert_eq!(ctx.read_index().await, "");
  }
}
