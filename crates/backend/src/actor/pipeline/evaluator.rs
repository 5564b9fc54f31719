//! Evaluator stage - primality tests on the blocking pool.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, trace};

use super::{DoneTracker, PipelineError};
use crate::{
  actor::message::{PipelineCandidate, PipelineEvaluated},
  context::primality::PrimalityTest,
};

/// Evaluator worker - tests candidates pulled from the shared queue.
///
/// Multiple workers run in parallel, each test on tokio's blocking pool since
/// Miller-Rabin on large values is CPU-bound.
///
/// Workers do not watch the cancellation token. The sequencer stops on cancel
/// and sends `Done`, and everything queued before it is still tested.
pub async fn evaluator_worker(
  worker_id: usize,
  test: PrimalityTest,
  rx: Arc<tokio::sync::Mutex<mpsc::Receiver<PipelineCandidate>>>,
  tx: mpsc::Sender<PipelineEvaluated>,
  done_tx: mpsc::Sender<()>,
) -> Result<u64, PipelineError> {
  trace!(worker_id, "Evaluator worker starting");
  let mut tested = 0u64;

  let result = loop {
    let msg = {
      let mut rx_guard = rx.lock().await;
      rx_guard.recv().await
    };

    match msg {
      Some(PipelineCandidate::Number(value)) => {
        let evaluated = match tokio::task::spawn_blocking(move || test.evaluate(value)).await {
          Ok(evaluated) => evaluated,
          Err(e) => {
            error!(worker_id, error = %e, "Primality test task failed");
            break Err(PipelineError::Task(e));
          }
        };

        if tx.send(PipelineEvaluated::Number(evaluated)).await.is_err() {
          trace!(worker_id, "Evaluator: downstream closed");
          break Ok(tested);
        }
        tested += 1;
      }
      // Done is the last message, the remaining workers see the closed channel
      Some(PipelineCandidate::Done) | None => {
        trace!(worker_id, tested, "Evaluator worker: input exhausted");
        break Ok(tested);
      }
    }
  };

  let _ = done_tx.send(()).await;
  trace!(worker_id, tested, "Evaluator worker finished");
  result
}

/// Aggregates Done signals from evaluator workers and forwards one to the router.
pub async fn evaluator_done_aggregator(
  worker_count: usize,
  mut done_rx: mpsc::Receiver<()>,
  tx: mpsc::Sender<PipelineEvaluated>,
) {
  let mut tracker = DoneTracker::new(worker_count);

  while let Some(()) = done_rx.recv().await {
    if tracker.record_done() {
      let _ = tx.send(PipelineEvaluated::Done).await;
      trace!(worker_count, "All evaluator workers finished, sent Done");
      break;
    }
  }
}
