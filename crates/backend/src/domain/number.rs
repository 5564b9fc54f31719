use std::time::Duration;

use num_bigint::BigUint;

/// A candidate after its primality test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatedNumber {
  pub value: BigUint,
  pub is_prime: bool,
  /// Wall-clock time spent testing `value`
  pub elapsed: Duration,
}

impl EvaluatedNumber {
  pub fn new(value: BigUint, is_prime: bool, elapsed: Duration) -> Self {
    Self {
      value,
      is_prime,
      elapsed,
    }
  }
}

/// Where a run starts, derived from the shard store at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
  /// Id of the shard the next flush writes into
  pub next_shard_id: u64,
  /// Last persisted prime, or the configured starting value
  pub resume_value: BigUint,
  /// Primes persisted across all indexed shards
  pub historical_count: u64,
  /// Entries already present in the shard at `next_shard_id`
  pub current_shard_fill: u64,
  /// Whether `resume_value` was read from a shard (and so is already persisted)
  pub resumed_from_disk: bool,
}

impl RunState {
  /// Fresh state for an empty store
  pub fn fresh(starting_value: BigUint) -> Self {
    Self {
      next_shard_id: 0,
      resume_value: starting_value,
      historical_count: 0,
      current_shard_fill: 0,
      resumed_from_disk: false,
    }
  }

  /// First value the sequencer should emit.
  ///
  /// A persisted resume value is not tested again; a configured one is.
  pub fn first_candidate(&self) -> BigUint {
    if self.resumed_from_disk {
      &self.resume_value + 1u32
    } else {
      self.resume_value.clone()
    }
  }
}

/// Round `count` down to the start of its block of `block` entries.
pub fn block_start(count: u64, block: u64) -> u64 {
  if block == 0 {
    return count;
  }
  count - count % block
}
