//! Sequencer stage - emits candidates for the evaluator pool.

use num_bigint::BigUint;
use num_traits::Zero;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::actor::message::PipelineCandidate;

/// Candidate sequence: 2, then odd numbers only.
///
/// Starting values below 2 begin at 2, and an even start above 2 is lifted to
/// the next odd number. Unbounded unless a ceiling is given, in which case
/// the sequence stops before reaching it.
#[derive(Debug, Clone)]
pub struct Sequencer {
  next: BigUint,
  ceiling: Option<BigUint>,
}

impl Sequencer {
  pub fn new(start: BigUint, ceiling: Option<BigUint>) -> Self {
    let two = BigUint::from(2u32);
    let next = if start <= two {
      two
    } else if (&start % 2u32).is_zero() {
      start + 1u32
    } else {
      start
    };
    Self { next, ceiling }
  }

  /// The value the next call to `next()` yields (ignoring the ceiling)
  pub fn peek(&self) -> &BigUint {
    &self.next
  }
}

impl Iterator for Sequencer {
  type Item = BigUint;

  fn next(&mut self) -> Option<BigUint> {
    if self.ceiling.as_ref().is_some_and(|ceiling| self.next >= *ceiling) {
      return None;
    }

    let step = if self.next == BigUint::from(2u32) { 1u32 } else { 2u32 };
    let current = self.next.clone();
    self.next += step;
    Some(current)
  }
}

/// Sequencer stage - feeds candidates to the evaluators until cancelled or
/// the ceiling is reached.
///
/// # Cancellation
///
/// Cancellation only stops production. Candidates already queued are still
/// evaluated, so a `Done` marker is always sent at the end.
pub async fn sequencer_stage(
  sequencer: Sequencer,
  tx: mpsc::Sender<PipelineCandidate>,
  cancel: CancellationToken,
) -> u64 {
  debug!(start = %sequencer.peek(), "Sequencer stage starting");
  let mut emitted = 0u64;

  for candidate in sequencer {
    if cancel.is_cancelled() {
      debug!(emitted, "Sequencer cancelled");
      break;
    }

    tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        debug!(emitted, "Sequencer cancelled during send");
        break;
      }
      result = tx.send(PipelineCandidate::Number(candidate)) => {
        if result.is_err() {
          debug!(emitted, "Sequencer: downstream closed");
          break;
        }
      }
    }
    emitted += 1;
    if emitted % 10_000 == 0 {
      trace!(emitted, "Sequencer progress");
    }
  }

  let _ = tx.send(PipelineCandidate::Done).await;
  debug!(emitted, "Sequencer stage complete");
  emitted
}
