//! Terminal formatting for pipeline events and run summaries.

use std::time::Duration;

use crossterm::style::Stylize;
use primegen::{GenerationReport, PipelineEvent, ShardSummary};

/// One line per event, coloured like `Testing 97 Success 1.2µs`
pub fn format_event(event: &PipelineEvent) -> String {
  match event {
    PipelineEvent::Accepted { value, elapsed } => {
      format!("Testing {} {} {}", value, "Success".green().bold(), format_elapsed(*elapsed).dim())
    }
    PipelineEvent::Rejected { value, elapsed } => {
      format!("Testing {} {} {}", value, "Fail".red(), format_elapsed(*elapsed).dim())
    }
    PipelineEvent::Flushed {
      shard_id,
      entries,
      shard_len,
    } => format!("Flushed {} primes to shard {} ({} entries)", entries, shard_id, shard_len)
      .cyan()
      .to_string(),
  }
}

fn format_elapsed(elapsed: Duration) -> String {
  format!("{:?}", elapsed)
}

/// Summary printed when a run ends
pub fn format_summary(report: &GenerationReport) -> String {
  let result = &report.result;
  let heading = if report.interrupted {
    "Generation interrupted".yellow().bold()
  } else {
    "Generation complete".green().bold()
  };

  let mut out = format!("\n{}\n", heading);
  out.push_str(&format!("Resumed from:     {}\n", report.resumed.resume_value));
  out.push_str(&format!("Candidates tested: {}\n", result.candidates_tested));
  out.push_str(&format!(
    "Primes found:     {} ({} rejected)\n",
    result.routed.accepted, result.routed.rejected
  ));
  out.push_str(&format!("Primes persisted: {}\n", result.flushed.persisted));

  let shards: Vec<String> = result.flushed.shards.iter().map(u64::to_string).collect();
  if shards.is_empty() {
    out.push_str("Shards touched:   none\n");
  } else {
    out.push_str(&format!("Shards touched:   {}\n", shards.join(", ")));
  }
  out.push_str(&format!("Total persisted:  {}", report.total_count()));
  out
}

/// Shard listing for `count --shards`
pub fn format_shard_table(shards: &[ShardSummary]) -> String {
  let mut out = format!(
    "{}  {}\n",
    format!("{:>14}", "SHARD").bold(),
    format!("{:>10}", "ENTRIES").bold()
  );
  for shard in shards {
    out.push_str(&format!("{:>14}  {:>10}\n", shard.id, shard.entries));
  }
  out
}
