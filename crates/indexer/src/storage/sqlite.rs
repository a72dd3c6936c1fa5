//! SQLite backend.
//!
//! The checkpoint lives in the `sync_state` singleton row; records live in `transfers`
//! (keyed by `tx_hash`) with their asset entries in `transfer_entries`.

use alloy::primitives::{Address, B256, U256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};
use transferwatch_core::{AssetAmount, TransferRecord};

use super::{CheckpointStore, RecordStore};

/// Database storage for the indexer.
///
/// Provides async access to SQLite database with connection pooling.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance with the given database URL.
    ///
    /// This will create the database file if it doesn't exist. Call
    /// [`Storage::run_migrations`] before use.
    ///
    /// # Example
    /// ```no_run
    /// # use transferwatch_indexer::storage::Storage;
    /// # async fn example() -> anyhow::Result<()> {
    /// let storage = Storage::new("sqlite://transferwatch.db").await?;
    /// storage.run_migrations().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Create a new storage instance with a specific file path.
    pub async fn new_with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let database_url = format!("sqlite://{}", path.display());
        Self::new(&database_url).await
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Migrations completed successfully");

        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection");
        self.pool.close().await;
    }

    /// Check database health.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;

        Ok(())
    }

    /// Get database statistics.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let transfer_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transfers")
            .fetch_one(&self.pool)
            .await?;

        let entry_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transfer_entries")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            transfer_count: transfer_count as u64,
            entry_count: entry_count as u64,
            last_block_number: self.last_block_number().await?,
        })
    }

    /// Read the checkpoint, propagating errors.
    pub async fn last_block_number(&self) -> Result<u64> {
        let value: i64 =
            sqlx::query_scalar("SELECT last_block_number FROM sync_state WHERE id = 1")
                .fetch_one(&self.pool)
                .await
                .context("Failed to fetch sync state")?;

        Ok(value as u64)
    }

    /// Read every record, propagating errors.
    pub async fn get_all_transfers(&self) -> Result<Vec<TransferRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT tx_hash, block_number, from_address, to_address, contract,
                   total_amount, block_timestamp, block_time
            FROM transfers
            ORDER BY block_number DESC, tx_hash ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch transfers")?;

        let entry_rows = sqlx::query(
            r#"
            SELECT tx_hash, asset_id, amount
            FROM transfer_entries
            ORDER BY tx_hash, position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch transfer entries")?;

        let mut entries: HashMap<Vec<u8>, Vec<AssetAmount>> = HashMap::new();
        for row in entry_rows {
            let tx_hash: Vec<u8> = row.get("tx_hash");
            let asset_id = parse_u256(row.get("asset_id"))?;
            let amount = parse_u256(row.get("amount"))?;
            entries
                .entry(tx_hash)
                .or_default()
                .push(AssetAmount::new(asset_id, amount));
        }

        rows.into_iter()
            .map(|row| Self::row_to_transfer(row, &mut entries))
            .collect()
    }

    fn row_to_transfer(
        row: SqliteRow,
        entries: &mut HashMap<Vec<u8>, Vec<AssetAmount>>,
    ) -> Result<TransferRecord> {
        let tx_hash_bytes: Vec<u8> = row.get("tx_hash");
        let from_bytes: Vec<u8> = row.get("from_address");
        let to_bytes: Vec<u8> = row.get("to_address");
        let contract_bytes: Vec<u8> = row.get("contract");

        Ok(TransferRecord {
            from: address_from_slice(&from_bytes)?,
            to: address_from_slice(&to_bytes)?,
            transfers: entries.remove(&tx_hash_bytes).unwrap_or_default(),
            total_amount: parse_u256(row.get("total_amount"))?,
            block_number: row.get::<i64, _>("block_number") as u64,
            tx_hash: b256_from_slice(&tx_hash_bytes)?,
            timestamp: row.get::<i64, _>("block_timestamp") as u64,
            time: row.get("block_time"),
            contract: address_from_slice(&contract_bytes)?,
        })
    }
}

#[async_trait]
impl CheckpointStore for Storage {
    async fn load(&self) -> u64 {
        match self.last_block_number().await {
            Ok(height) => height,
            Err(e) => {
                warn!("Failed to read checkpoint, starting fresh: {:#}", e);
                0
            }
        }
    }

    async fn save(&self, height: u64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_state
            SET last_block_number = ?,
                updated_at = ?
            WHERE id = 1
            "#,
        )
        .bind(height as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to update sync state")?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for Storage {
    async fn load_all(&self) -> Vec<TransferRecord> {
        match self.get_all_transfers().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to read transfers, treating as empty: {:#}", e);
                Vec::new()
            }
        }
    }

    async fn exists(&self, tx_hash: &B256) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM transfers WHERE tx_hash = ?")
            .bind(tx_hash.as_slice())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up transfer")?;

        Ok(found.is_some())
    }

    async fn append(&self, record: TransferRecord) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let result = sqlx::query(
            r#"
            INSERT INTO transfers (
                tx_hash, block_number, from_address, to_address, contract,
                total_amount, block_timestamp, block_time, ingested_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tx_hash) DO NOTHING
            "#,
        )
        .bind(record.tx_hash.as_slice())
        .bind(record.block_number as i64)
        .bind(record.from.as_slice())
        .bind(record.to.as_slice())
        .bind(record.contract.as_slice())
        .bind(record.total_amount.to_string())
        .bind(record.timestamp as i64)
        .bind(record.time.as_str())
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .context("Failed to insert transfer")?;

        if result.rows_affected() == 0 {
            // Duplicate: nothing to roll back
            return Ok(false);
        }

        for (position, entry) in record.transfers.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transfer_entries (tx_hash, position, asset_id, amount)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(record.tx_hash.as_slice())
            .bind(position as i64)
            .bind(entry.asset_id.to_string())
            .bind(entry.amount.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to insert transfer entry")?;
        }

        tx.commit().await.context("Failed to commit transfer")?;

        Ok(true)
    }
}

/// Database statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Number of recorded transactions
    pub transfer_count: u64,

    /// Number of (asset id, amount) entries across all records
    pub entry_count: u64,

    /// Last processed block number
    pub last_block_number: u64,
}

fn parse_u256(text: String) -> Result<U256> {
    U256::from_str(&text).with_context(|| format!("Invalid uint256 in database: {}", text))
}

fn address_from_slice(bytes: &[u8]) -> Result<Address> {
    anyhow::ensure!(bytes.len() == 20, "Invalid address length {}", bytes.len());
    Ok(Address::from_slice(bytes))
}

fn b256_from_slice(bytes: &[u8]) -> Result<B256> {
    anyhow::ensure!(bytes.len() == 32, "Invalid hash length {}", bytes.len());
    Ok(B256::from_slice(bytes))
}
