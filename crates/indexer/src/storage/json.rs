//! JSON file backend.
//!
//! Both files are rewritten wholesale through a temporary file in the same directory
//! followed by a rename, so a crash mid-write leaves either the old or the new content.

use alloy::primitives::B256;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use transferwatch_core::{sort_most_recent_first, TransferRecord};

use super::{CheckpointStore, RecordStore};

/// On-disk checkpoint document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointDocument {
    /// Last fully processed block.
    pub last_processed_block: u64,
    /// Unix timestamp of the write.
    #[serde(default)]
    pub updated_at: i64,
}

// Older deployments wrote the bare block number
#[derive(Deserialize)]
#[serde(untagged)]
enum CheckpointOnDisk {
    Document(CheckpointDocument),
    Bare(u64),
}

/// Checkpoint persisted as a small JSON document.
#[derive(Debug, Clone)]
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    /// Create a checkpoint file handle (nothing is touched until the first save).
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CheckpointStore for CheckpointFile {
    async fn load(&self) -> u64 {
        let contents = match read_if_present(&self.path).await {
            Ok(Some(contents)) => contents,
            Ok(None) => return 0,
            Err(e) => {
                warn!("{:#}, starting fresh", e);
                return 0;
            }
        };

        match serde_json::from_str::<CheckpointOnDisk>(&contents) {
            Ok(CheckpointOnDisk::Document(doc)) => doc.last_processed_block,
            Ok(CheckpointOnDisk::Bare(height)) => height,
            Err(e) => {
                warn!(
                    "Checkpoint file {} is corrupt, starting fresh: {}",
                    self.path.display(),
                    e
                );
                0
            }
        }
    }

    async fn save(&self, height: u64) -> Result<()> {
        let doc = CheckpointDocument {
            last_processed_block: height,
            updated_at: chrono::Utc::now().timestamp(),
        };
        let bytes = serde_json::to_vec_pretty(&doc).context("Failed to encode checkpoint")?;

        write_atomic(self.path.clone(), bytes)
            .await
            .with_context(|| format!("Failed to save checkpoint {}", height))
    }
}

/// Transfer records persisted as one JSON array, most recent first.
///
/// Every append reloads, inserts and rewrites the whole file. This is fine while the
/// record count stays in the thousands; use the SQLite backend beyond that.
#[derive(Debug)]
pub struct RecordFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RecordFile {
    /// Create a record file handle.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Read the stored records. I/O failures are returned; an unparseable file reads
    /// as empty.
    async fn read_records(&self) -> Result<Vec<TransferRecord>> {
        let Some(contents) = read_if_present(&self.path).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<TransferRecord>>(&contents) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(
                    "Record file {} is corrupt, treating as empty: {}",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl RecordStore for RecordFile {
    async fn load_all(&self) -> Vec<TransferRecord> {
        self.read_records().await.unwrap_or_else(|e| {
            warn!("{:#}, treating as empty", e);
            Vec::new()
        })
    }

    async fn exists(&self, tx_hash: &B256) -> Result<bool> {
        Ok(self
            .read_records()
            .await?
            .iter()
            .any(|record| record.tx_hash == *tx_hash))
    }

    async fn append(&self, record: TransferRecord) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        // A read failure must not be mistaken for an empty store and overwritten
        let mut records = self.read_records().await?;
        if records.iter().any(|r| r.tx_hash == record.tx_hash) {
            return Ok(false);
        }

        let tx_hash = record.tx_hash;
        records.push(record);
        sort_most_recent_first(&mut records);

        let bytes = serde_json::to_vec_pretty(&records).context("Failed to encode records")?;
        write_atomic(self.path.clone(), bytes)
            .await
            .with_context(|| format!("Failed to append record for tx {}", tx_hash))?;

        Ok(true)
    }
}

/// Read a file, returning `None` if it does not exist.
async fn read_if_present(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} does not exist yet", path.display());
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Replace `path` with `bytes` via a sibling temp file and rename.
async fn write_atomic(path: PathBuf, bytes: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to rename temp file onto {}", path.display()))?;

        Ok(())
    })
    .await
    .context("Write task panicked")?
}
