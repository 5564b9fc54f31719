//! Router stage - splits evaluated candidates into accepted and rejected.

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::actor::message::PipelineEvaluated;

/// Counts returned by the router stage
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
  pub accepted: u64,
  pub rejected: u64,
}

/// Router stage - forwards each value to exactly one of the two queues.
///
/// Runs until the evaluator side closes, then forwards `Done` to both.
/// A closed rejected queue is tolerated; a closed accepted queue stops the
/// router since nothing could be persisted anyway.
pub async fn router_stage(
  mut rx: mpsc::Receiver<PipelineEvaluated>,
  accepted_tx: mpsc::Sender<PipelineEvaluated>,
  rejected_tx: mpsc::Sender<PipelineEvaluated>,
) -> RouterStats {
  debug!("Router stage starting");
  let mut stats = RouterStats::default();
  let mut rejected_open = true;

  loop {
    match rx.recv().await {
      Some(PipelineEvaluated::Number(number)) if number.is_prime => {
        if accepted_tx.send(PipelineEvaluated::Number(number)).await.is_err() {
          debug!("Router: accepted queue closed");
          break;
        }
        stats.accepted += 1;
      }
      Some(PipelineEvaluated::Number(number)) => {
        stats.rejected += 1;
        if rejected_open && rejected_tx.send(PipelineEvaluated::Number(number)).await.is_err() {
          trace!("Router: rejected queue closed");
          rejected_open = false;
        }
      }
      Some(PipelineEvaluated::Done) | None => break,
    }
  }

  let _ = accepted_tx.send(PipelineEvaluated::Done).await;
  if rejected_open {
    let _ = rejected_tx.send(PipelineEvaluated::Done).await;
  }

  debug!(accepted = stats.accepted, rejected = stats.rejected, "Router stage complete");
  stats
}
