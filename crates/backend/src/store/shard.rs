//! Shard files: `<id>.txt`, one decimal prime per line, ascending.

use std::path::{Path, PathBuf};

use num_bigint::BigUint;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub fn shard_path(base: &Path, id: u64) -> PathBuf {
  base.join(format!("{}.txt", id))
}

/// Render values as newline-terminated decimal lines
pub fn format_values(values: &[BigUint]) -> String {
  let mut out = String::with_capacity(values.len() * 8);
  for value in values {
    out.push_str(&value.to_str_radix(10));
    out.push('\n');
  }
  out
}

/// Scan a shard once, returning its entry count and last non-empty line.
pub async fn scan(path: &Path) -> std::io::Result<(u64, Option<String>)> {
  let file = tokio::fs::File::open(path).await?;
  let mut lines = BufReader::new(file).lines();

  let mut count = 0u64;
  let mut last = None;
  while let Some(line) = lines.next_line().await? {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    count += 1;
    last = Some(line.to_string());
  }
  Ok((count, last))
}

pub async fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
  let content = tokio::fs::read_to_string(path).await?;
  Ok(
    content
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .map(str::to_string)
      .collect(),
  )
}

/// Append `values` to the shard at `path`, syncing before returning.
///
/// On a failed write the file is truncated back to its previous length so a
/// retry does not leave a torn line behind.
pub async fn append(path: &Path, values: &[BigUint]) -> std::io::Result<()> {
  let mut file = tokio::fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .await?;
  let original_len = file.metadata().await?.len();

  let payload = format_values(values);
  let written = async {
    file.write_all(payload.as_bytes()).await?;
    file.flush().await?;
    file.sync_data().await
  }
  .await;

  if let Err(e) = written {
    let _ = file.set_len(original_len).await;
    return Err(e);
  }
  Ok(())
}
