//! Shard Store - persisted primes and resume state.
//!
//! ```text
//! <base>/
//!   directory.txt   # shard ids, one per line, creation order
//!   0.txt           # primes #0 .. #T-1, ascending
//!   300.txt         # primes #300 .. #599
//! ```
//!
//! A shard's id is the number of primes persisted before it, so ids advance in
//! blocks of the flush threshold `T` and locating a shard never needs a scan.
//!
//! The store is not internally synchronized. During a run it is owned by the
//! flusher stage, which is the only writer.

mod directory;
mod shard;

use std::{
  collections::{HashMap, HashSet},
  path::PathBuf,
};

use num_bigint::BigUint;
use tracing::{debug, trace, warn};

pub use self::directory::DIRECTORY_FILE;
use self::directory::DirectoryIndex;
use crate::domain::number::{RunState, block_start};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("Failed to create store directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to access directory index {path}: {source}")]
  Index {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Corrupt directory index entry {line:?} at line {line_no}")]
  CorruptIndex { line_no: usize, line: String },
  #[error("Failed to read shard {id} at {path}: {source}")]
  ShardRead {
    id: u64,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to write shard {id} at {path}: {source}")]
  ShardWrite {
    id: u64,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Malformed value {value:?} in shard {id}")]
  MalformedValue { id: u64, value: String },
}

/// Entry count of one indexed shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSummary {
  pub id: u64,
  pub entries: u64,
}

#[derive(Debug)]
pub struct ShardStore {
  base: PathBuf,
  directory: DirectoryIndex,
  ids: Vec<u64>,
  indexed: HashSet<u64>,
}

impl ShardStore {
  /// Open (creating if needed) the store rooted at `base`.
  pub async fn open(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let base = base.into();
    tokio::fs::create_dir_all(&base)
      .await
      .map_err(|source| StoreError::CreateDir {
        path: base.clone(),
        source,
      })?;

    let directory = DirectoryIndex::new(&base);
    let ids = directory.read_ids().await?;
    let indexed = ids.iter().copied().collect();
    debug!(base = %base.display(), shards = ids.len(), "Opened shard store");

    Ok(Self {
      base,
      directory,
      ids,
      indexed,
    })
  }

  /// Indexed shard ids in creation order
  pub fn shard_ids(&self) -> &[u64] {
    &self.ids
  }

  pub fn shard_path(&self, id: u64) -> PathBuf {
    shard::shard_path(&self.base, id)
  }

  /// Entry count of every indexed shard, in index order
  pub async fn summary(&self) -> Result<Vec<ShardSummary>, StoreError> {
    let mut shards = Vec::with_capacity(self.ids.len());
    for &id in &self.ids {
      let (entries, _) = self.scan_shard(id).await?;
      shards.push(ShardSummary { id, entries });
    }
    Ok(shards)
  }

  /// Total primes persisted across every indexed shard
  pub async fn count(&self) -> Result<u64, StoreError> {
    Ok(self.summary().await?.iter().map(|s| s.entries).sum())
  }

  /// Work out where the previous run left off.
  ///
  /// `historical_count` sums every indexed shard. Shards are sorted, so each
  /// one's last line is its largest value, and the resume value is the largest
  /// of those. With several workers a drained remainder can sit below a value
  /// already flushed to an earlier shard, so the newest shard alone is not
  /// enough. Last lines that do not parse are skipped with a warning; when no
  /// shard yields a value, `fallback` is used instead.
  ///
  /// A configured restart never tops up a partial shard, since re-enumerated
  /// values would land below the ones already in it. Shards that already hold
  /// a full block are never topped up either.
  pub async fn resume(&self, fallback: &BigUint, flush_threshold: u64) -> Result<RunState, StoreError> {
    let mut historical_count = 0u64;
    let mut entries_by_id = HashMap::with_capacity(self.ids.len());
    let mut largest: Option<BigUint> = None;
    let mut malformed = false;

    for &id in &self.ids {
      let (entries, last) = self.scan_shard(id).await?;
      historical_count += entries;
      entries_by_id.insert(id, entries);

      let Some(line) = last else { continue };
      match line.parse::<BigUint>() {
        Ok(value) => {
          if largest.as_ref().is_none_or(|max| value > *max) {
            largest = Some(value);
          }
        }
        Err(_) => {
          warn!(shard = id, line = %line, "Last line of shard is not an integer");
          malformed = true;
        }
      }
    }

    let (resume_value, resumed_from_disk) = match largest {
      Some(value) => (value, true),
      None => {
        if malformed {
          warn!(fallback = %fallback, "No persisted value to resume from, using the configured starting value");
        }
        (fallback.clone(), false)
      }
    };

    let mut next_shard_id = block_start(historical_count, flush_threshold);
    let mut current_shard_fill = entries_by_id.get(&next_shard_id).copied().unwrap_or(0);
    while flush_threshold > 0
      && current_shard_fill > 0
      && (!resumed_from_disk || current_shard_fill >= flush_threshold)
    {
      debug!(shard = next_shard_id, entries = current_shard_fill, "Not topping up shard, starting the next block");
      next_shard_id += flush_threshold;
      current_shard_fill = entries_by_id.get(&next_shard_id).copied().unwrap_or(0);
    }

    debug!(
      historical_count,
      next_shard_id,
      current_shard_fill,
      resume_value = %resume_value,
      resumed_from_disk,
      "Computed resume state"
    );

    Ok(RunState {
      next_shard_id,
      resume_value,
      historical_count,
      current_shard_fill,
      resumed_from_disk,
    })
  }

  /// Append already-sorted values to shard `id`, indexing it if it is new.
  ///
  /// The shard file is created before its index entry, so every indexed id has
  /// a file behind it.
  pub async fn append_to_shard(&mut self, id: u64, sorted_values: &[BigUint]) -> Result<(), StoreError> {
    let path = self.shard_path(id);
    let write_err = |source| StoreError::ShardWrite {
      id,
      path: path.clone(),
      source,
    };

    if !self.indexed.contains(&id) {
      tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(write_err)?;
      self.directory.append(id).await?;
      self.indexed.insert(id);
      self.ids.push(id);
      debug!(shard = id, "Created shard");
    }

    shard::append(&path, sorted_values).await.map_err(write_err)?;
    trace!(shard = id, entries = sorted_values.len(), "Appended to shard");
    Ok(())
  }

  /// Read a shard back as integers
  pub async fn read_shard(&self, id: u64) -> Result<Vec<BigUint>, StoreError> {
    let path = self.shard_path(id);
    let lines = shard::read_lines(&path)
      .await
      .map_err(|source| StoreError::ShardRead { id, path, source })?;

    lines
      .into_iter()
      .map(|line| {
        line
          .parse::<BigUint>()
          .map_err(|_| StoreError::MalformedValue { id, value: line })
      })
      .collect()
  }

  async fn scan_shard(&self, id: u64) -> Result<(u64, Option<String>), StoreError> {
    let path = self.shard_path(id);
    shard::scan(&path)
      .await
      .map_err(|source| StoreError::ShardRead { id, path, source })
  }
}
