//! Pipeline message types
//!
//! The pipeline uses bounded channels with backpressure between stages:
//!
//! ```text
//!                                          ┌→ accepted → Flusher → ShardStore
//! Sequencer → candidates → Evaluators → Router
//!    100                      pool      100 └→ rejected → Reporter
//! ```
//!
//! Every stage forwards a `Done` marker once its input is exhausted so the
//! stage below can finish its own work (final flush, summary) and exit.

use std::time::Duration;

use num_bigint::BigUint;

use crate::domain::number::EvaluatedNumber;

/// Sequencer → Evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineCandidate {
  Number(BigUint),
  Done,
}

/// Evaluator → Router, and Router → Flusher / Reporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvaluated {
  Number(EvaluatedNumber),
  Done,
}

/// Notifications for whoever displays the run.
///
/// Accepted values arrive in test-completion order, which differs from
/// candidate order whenever more than one evaluator is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
  /// A prime reached the accepted buffer
  Accepted { value: BigUint, elapsed: Duration },
  /// A composite, only sent when rejected values are shown
  Rejected { value: BigUint, elapsed: Duration },
  /// A buffer was written to a shard
  Flushed {
    shard_id: u64,
    /// Values written by this flush
    entries: usize,
    /// Entries in the shard after the write
    shard_len: u64,
  },
}

impl PipelineEvent {
  pub fn accepted(number: &EvaluatedNumber) -> Self {
    Self::Accepted {
      value: number.value.clone(),
      elapsed: number.elapsed,
    }
  }

  pub fn rejected(number: &EvaluatedNumber) -> Self {
    Self::Rejected {
      value: number.value.clone(),
      elapsed: number.elapsed,
    }
  }
}
