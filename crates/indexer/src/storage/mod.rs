//! Storage layer for the transferwatch indexer.
//!
//! This module provides persistence for:
//! - The checkpoint (last fully processed block)
//! - Transfer records (idempotent by transaction hash)
//!
//! Two backends implement them: JSON files rewritten atomically ([`CheckpointFile`],
//! [`RecordFile`]) and SQLite ([`Storage`], which implements both). Scanning code only
//! sees the traits.
//!
//! Unreadable or corrupt state is treated as absent: `load` falls back to 0 and
//! `load_all` to an empty list, each with a warning, so a damaged file restarts the
//! scan instead of stopping the service.

use alloy::primitives::B256;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use transferwatch_core::TransferRecord;

pub mod json;
pub mod sqlite;

pub use json::{CheckpointFile, RecordFile};
pub use sqlite::{DatabaseStats, Storage};

use crate::config::{StorageBackend, StorageConfig};

/// Durable last-processed block height.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last processed height, or 0 if none is stored or it cannot be read.
    async fn load(&self) -> u64;

    /// Overwrite the stored height.
    async fn save(&self, height: u64) -> Result<()>;
}

/// Durable, append-only collection of transfer records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records, most recent first. Empty if the store is absent or unreadable.
    async fn load_all(&self) -> Vec<TransferRecord>;

    /// Whether a record for `tx_hash` is already stored.
    async fn exists(&self, tx_hash: &B256) -> Result<bool>;

    /// Insert `record` unless its transaction is already stored.
    ///
    /// Returns `true` if inserted, `false` for a duplicate.
    async fn append(&self, record: TransferRecord) -> Result<bool>;
}

/// Checkpoint and record store handles opened from configuration.
#[derive(Clone)]
pub struct Stores {
    /// Checkpoint store.
    pub checkpoint: Arc<dyn CheckpointStore>,
    /// Record store.
    pub records: Arc<dyn RecordStore>,
    /// SQLite handle when that backend is in use (closed on shutdown).
    pub database: Option<Storage>,
}

impl Stores {
    /// Open the backend selected in `config`.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        match config.backend {
            StorageBackend::Json => {
                info!(
                    "Using JSON stores: checkpoint={} records={}",
                    config.checkpoint_path, config.records_path
                );
                Ok(Self {
                    checkpoint: Arc::new(CheckpointFile::new(&config.checkpoint_path)),
                    records: Arc::new(RecordFile::new(&config.records_path)),
                    database: None,
                })
            }
            StorageBackend::Sqlite => {
                let storage = Storage::new(&config.database_url).await?;
                storage.run_migrations().await?;
                let shared = Arc::new(storage.clone());
                Ok(Self {
                    checkpoint: shared.clone(),
                    records: shared,
                    database: Some(storage),
                })
            }
        }
    }

    /// Release backend resources.
    pub async fn close(&self) {
        if let Some(storage) = &self.database {
            storage.close().await;
        }
    }
}
