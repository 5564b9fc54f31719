//! Reporter stage - optional display of rejected candidates.

use tokio::sync::mpsc;
use tracing::debug;

use crate::actor::message::{PipelineEvaluated, PipelineEvent};

/// Consumes the rejected queue. Values are forwarded as `Rejected` events when
/// `show_fails` is set and there is somewhere to send them, dropped otherwise.
pub async fn reporter_stage(
  mut rx: mpsc::Receiver<PipelineEvaluated>,
  show_fails: bool,
  events: Option<mpsc::Sender<PipelineEvent>>,
) -> u64 {
  let mut events = if show_fails { events } else { None };
  let mut reported = 0u64;

  while let Some(msg) = rx.recv().await {
    let number = match msg {
      PipelineEvaluated::Number(number) => number,
      PipelineEvaluated::Done => break,
    };

    if let Some(tx) = &events {
      if tx.send(PipelineEvent::rejected(&number)).await.is_err() {
        debug!("Reporter: event receiver closed");
        events = None;
      } else {
        reported += 1;
      }
    }
  }

  debug!(reported, "Reporter stage complete");
  reported
}
