//! `directory.txt` - the append-only list of shard ids in creation order.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use super::StoreError;

pub const DIRECTORY_FILE: &str = "directory.txt";

#[derive(Debug, Clone)]
pub struct DirectoryIndex {
  path: PathBuf,
}

impl DirectoryIndex {
  pub fn new(base: &Path) -> Self {
    Self {
      path: base.join(DIRECTORY_FILE),
    }
  }

  #[cfg(test)]
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Read every indexed shard id, in creation order.
  ///
  /// A missing index is an empty store. Any other read failure, or a line that
  /// is not a shard id, is an error: resume state cannot be trusted without it.
  pub async fn read_ids(&self) -> Result<Vec<u64>, StoreError> {
    let content = match tokio::fs::read_to_string(&self.path).await {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => {
        return Err(StoreError::Index {
          path: self.path.clone(),
          source,
        });
      }
    };

    let mut ids = Vec::new();
    for (i, line) in content.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      let id = line.parse::<u64>().map_err(|_| StoreError::CorruptIndex {
        line_no: i + 1,
        line: line.to_string(),
      })?;
      ids.push(id);
    }
    Ok(ids)
  }

  /// Record a newly created shard.
  ///
  /// An id already on disk is left alone: a failed sync can still have
  /// persisted the line, and a retry must not index the shard twice.
  pub async fn append(&self, id: u64) -> Result<(), StoreError> {
    if self.read_ids().await?.contains(&id) {
      return Ok(());
    }

    let io_err = |source| StoreError::Index {
      path: self.path.clone(),
      source,
    };

    let mut file = tokio::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .await
      .map_err(io_err)?;
    file.write_all(format!("{}\n", id).as_bytes()).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)?;
    file.sync_data().await.map_err(io_err)?;
    Ok(())
  }
}
