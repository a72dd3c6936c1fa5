//! Shared fixtures for the ingestion tests.

#![allow(dead_code)]

use alloy::primitives::{Address, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use transferwatch_core::{ScanRange, WatchSet};
use transferwatch_indexer::config::WatchConfig;
use transferwatch_indexer::listener::{ChainClient, RawTransfer, TransferFilter, TransferShape};
use transferwatch_indexer::storage::{CheckpointFile, RecordFile, Stores};

pub const ACCOUNT: Address = Address::repeat_byte(0xee);
pub const CONTRACT: Address = Address::repeat_byte(0xcc);
pub const SENDER: Address = Address::repeat_byte(0x01);
pub const STRANGER: Address = Address::repeat_byte(0x42);

/// Timestamp the mock reports for `height`.
pub fn block_time(height: u64) -> u64 {
    1_600_000_000 + height * 12
}

#[derive(Default)]
struct MockState {
    head: u64,
    events: Vec<RawTransfer>,
    fail_from: Option<u64>,
    fail_head: bool,
    queries: Vec<(TransferShape, ScanRange)>,
    timestamp_calls: usize,
}

/// In-memory chain with scripted head, events and failures.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(head: u64) -> Arc<Self> {
        let chain = Self::default();
        chain.state.lock().unwrap().head = head;
        Arc::new(chain)
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    pub fn push(&self, event: RawTransfer) {
        self.state.lock().unwrap().events.push(event);
    }

    /// Make log queries whose range reaches `height` fail (None to heal).
    pub fn fail_ranges_from(&self, height: Option<u64>) {
        self.state.lock().unwrap().fail_from = height;
    }

    pub fn fail_head(&self, fail: bool) {
        self.state.lock().unwrap().fail_head = fail;
    }

    /// Ranges queried so far (single-shape queries only, so each range appears once).
    pub fn scanned_ranges(&self) -> Vec<ScanRange> {
        self.state
            .lock()
            .unwrap()
            .queries
            .iter()
            .filter(|(shape, _)| *shape == TransferShape::Single)
            .map(|(_, range)| *range)
            .collect()
    }

    pub fn clear_queries(&self) {
        self.state.lock().unwrap().queries.clear();
    }

    pub fn timestamp_calls(&self) -> usize {
        self.state.lock().unwrap().timestamp_calls
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn current_height(&self) -> Result<u64> {
        let state = self.state.lock().unwrap();
        if state.fail_head {
            anyhow::bail!("head unavailable");
        }
        Ok(state.head)
    }

    async fn transfer_events(
        &self,
        contract: Address,
        shape: TransferShape,
        range: ScanRange,
    ) -> Result<Vec<RawTransfer>> {
        let mut state = self.state.lock().unwrap();
        state.queries.push((shape, range));

        if let Some(fail_from) = state.fail_from {
            if range.end >= fail_from {
                anyhow::bail!("getLogs failed for {}", range);
            }
        }
        if contract != CONTRACT {
            return Ok(Vec::new());
        }

        Ok(state
            .events
            .iter()
            .filter(|e| e.shape == shape && range.contains(e.block_number))
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, height: u64) -> Result<u64> {
        self.state.lock().unwrap().timestamp_calls += 1;
        Ok(block_time(height))
    }
}

pub fn single(tx_byte: u8, block_number: u64, to: Address, id: u64, amount: u64) -> RawTransfer {
    RawTransfer {
        shape: TransferShape::Single,
        from: SENDER,
        to,
        ids: vec![U256::from(id)],
        amounts: vec![U256::from(amount)],
        block_number,
        tx_hash: B256::repeat_byte(tx_byte),
        log_index: 0,
    }
}

pub fn batch(
    tx_byte: u8,
    block_number: u64,
    to: Address,
    ids: &[u64],
    amounts: &[u64],
) -> RawTransfer {
    RawTransfer {
        shape: TransferShape::Batch,
        from: SENDER,
        to,
        ids: ids.iter().map(|v| U256::from(*v)).collect(),
        amounts: amounts.iter().map(|v| U256::from(*v)).collect(),
        block_number,
        tx_hash: B256::repeat_byte(tx_byte),
        log_index: 1,
    }
}

pub fn watch_config(watched: &[u64], confirmations: u64, batch_size: u64) -> WatchConfig {
    WatchConfig {
        account: ACCOUNT,
        contract: CONTRACT,
        watch_set: WatchSet::new(watched.iter().map(|v| U256::from(*v))).unwrap(),
        confirmations,
        batch_size,
        lookback_blocks: 1_000,
        start_block: Some(0),
        poll_interval: Duration::from_millis(10),
    }
}

/// JSON stores in a scratch directory. Keep the `TempDir` alive for the test.
pub fn json_stores() -> (Stores, TempDir) {
    let dir = TempDir::new().unwrap();
    let stores = Stores {
        checkpoint: Arc::new(CheckpointFile::new(dir.path().join("checkpoint.json"))),
        records: Arc::new(RecordFile::new(dir.path().join("transfers.json"))),
        database: None,
    };
    (stores, dir)
}

pub fn filter(chain: &Arc<MockChain>, stores: &Stores, watch: &Arc<WatchConfig>) -> TransferFilter {
    TransferFilter::new(chain.clone(), stores.records.clone(), watch.clone())
}
