//! Watch-predicate filtering and normalization of raw transfers into records.

use alloy::primitives::{Address, B256};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};
use transferwatch_core::{AssetAmount, ScanRange, TransferRecord, WatchSet};

use super::client::{ChainClient, RawTransfer, TransferShape};
use crate::config::WatchConfig;
use crate::storage::RecordStore;

/// Watched entries of one transaction, awaiting a block timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    /// Sender of the first matching event in the transaction.
    pub from: Address,
    /// Receiver (the watched account).
    pub to: Address,
    /// Retained entries, in log order.
    pub transfers: Vec<AssetAmount>,
    /// Block containing the transaction.
    pub block_number: u64,
    /// Transaction hash.
    pub tx_hash: B256,
}

impl PendingTransfer {
    /// Attach the block timestamp and build the final record.
    pub fn into_record(self, timestamp: u64, contract: Address) -> Result<TransferRecord> {
        let time = chrono::DateTime::from_timestamp(timestamp as i64, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| timestamp.to_string());

        TransferRecord::new(
            self.from,
            self.to,
            self.transfers,
            self.block_number,
            self.tx_hash,
            timestamp,
            time,
            contract,
        )
        .context("Failed to build transfer record")
    }
}

/// Per-range counters reported by [`TransferFilter::scan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Raw events returned by the chain client.
    pub events_seen: usize,
    /// Transactions with at least one watched entry.
    pub transactions_matched: usize,
    /// New records appended.
    pub records_inserted: usize,
    /// Matching transactions that were already stored.
    pub duplicates_skipped: usize,
}

/// Apply the watch predicate to `events` and group survivors by transaction.
///
/// An event is kept only if its receiver is `account`; within it, only entries whose
/// asset id is in `watch_set` are kept, and an event left with no entries is dropped.
/// Events sharing a transaction are merged into one [`PendingTransfer`]. Output is
/// ordered by the first matching event of each transaction in (block, log index) order.
pub fn select_watched(
    events: &[RawTransfer],
    account: Address,
    watch_set: &WatchSet,
) -> Vec<PendingTransfer> {
    let mut ordered: Vec<&RawTransfer> = events.iter().collect();
    ordered.sort_by_key(|e| (e.block_number, e.log_index));

    let mut pending: Vec<PendingTransfer> = Vec::new();

    for event in ordered {
        if event.to != account {
            continue;
        }

        let entries = match event.entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping malformed transfer in tx {}: {}", event.tx_hash, e);
                continue;
            }
        };

        let watched: Vec<AssetAmount> = entries
            .into_iter()
            .filter(|entry| watch_set.contains(&entry.asset_id))
            .collect();
        if watched.is_empty() {
            continue;
        }

        match pending.iter_mut().find(|p| p.tx_hash == event.tx_hash) {
            Some(existing) => existing.transfers.extend(watched),
            None => pending.push(PendingTransfer {
                from: event.from,
                to: event.to,
                transfers: watched,
                block_number: event.block_number,
                tx_hash: event.tx_hash,
            }),
        }
    }

    pending
}

/// Fetches, filters and stores the watched transfers of one range at a time.
#[derive(Clone)]
pub struct TransferFilter {
    client: Arc<dyn ChainClient>,
    records: Arc<dyn RecordStore>,
    watch: Arc<WatchConfig>,
}

impl TransferFilter {
    /// Create a new filter.
    pub fn new(
        client: Arc<dyn ChainClient>,
        records: Arc<dyn RecordStore>,
        watch: Arc<WatchConfig>,
    ) -> Self {
        Self {
            client,
            records,
            watch,
        }
    }

    /// Scan `range` and append a record for each new matching transaction.
    ///
    /// Any retrieval or storage failure is returned so the caller does not advance
    /// its checkpoint past the range.
    pub async fn scan(&self, range: ScanRange) -> Result<ScanSummary> {
        let mut events = Vec::new();
        for shape in TransferShape::ALL {
            let batch = self
                .client
                .transfer_events(self.watch.contract, shape, range)
                .await
                .with_context(|| {
                    format!("Failed to fetch {} transfers for {}", shape.as_str(), range)
                })?;
            events.extend(batch);
        }

        let pending = select_watched(&events, self.watch.account, &self.watch.watch_set);

        let mut summary = ScanSummary {
            events_seen: events.len(),
            transactions_matched: pending.len(),
            ..Default::default()
        };

        for transfer in pending {
            if self.records.exists(&transfer.tx_hash).await? {
                debug!("Transfer {} already recorded", transfer.tx_hash);
                summary.duplicates_skipped += 1;
                continue;
            }

            let timestamp = self
                .client
                .block_timestamp(transfer.block_number)
                .await
                .with_context(|| {
                    format!("Failed to resolve timestamp of block {}", transfer.block_number)
                })?;

            let record = transfer.into_record(timestamp, self.watch.contract)?;
            let (tx_hash, block_number) = (record.tx_hash, record.block_number);
            let ids = record.asset_ids();
            let total = record.total_amount;
            let from = record.from;

            if self.records.append(record).await? {
                info!(
                    "New transfer: tx={} block={} from={} ids={:?} total={}",
                    tx_hash, block_number, from, ids, total
                );
                summary.records_inserted += 1;
            } else {
                summary.duplicates_skipped += 1;
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    const WATCHED: Address = Address::repeat_byte(0xee);

    fn watch_set(ids: &[u64]) -> WatchSet {
        WatchSet::new(ids.iter().map(|id| U256::from(*id))).unwrap()
    }

    fn event(
        shape: TransferShape,
        to: Address,
        ids: &[u64],
        amounts: &[u64],
        block_number: u64,
        log_index: u64,
        tx_byte: u8,
    ) -> RawTransfer {
        RawTransfer {
            shape,
            from: Address::repeat_byte(0x01),
            to,
            ids: ids.iter().map(|v| U256::from(*v)).collect(),
            amounts: amounts.iter().map(|v| U256::from(*v)).collect(),
            block_number,
            tx_hash: B256::repeat_byte(tx_byte),
            log_index,
        }
    }

    #[test]
    fn test_rejects_other_receivers() {
        let other = Address::repeat_byte(0x42);
        let events = vec![
            event(TransferShape::Single, other, &[5], &[1], 10, 0, 0xa1),
            event(TransferShape::Batch, other, &[5, 6], &[1, 1], 10, 1, 0xa2),
        ];

        assert!(select_watched(&events, WATCHED, &watch_set(&[5, 6])).is_empty());
    }

    #[test]
    fn test_batch_keeps_only_watched_entries() {
        let events = vec![event(
            TransferShape::Batch,
            WATCHED,
            &[5, 999, 6],
            &[3, 7, 2],
            10,
            0,
            0xa1,
        )];

        let pending = select_watched(&events, WATCHED, &watch_set(&[5, 6]));
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].transfers,
            vec![
                AssetAmount::new(U256::from(5), U256::from(3)),
                AssetAmount::new(U256::from(6), U256::from(2)),
            ]
        );
    }

    #[test]
    fn test_batch_with_no_watched_entries_is_dropped() {
        let events = vec![event(
            TransferShape::Batch,
            WATCHED,
            &[998, 999],
            &[1, 1],
            10,
            0,
            0xa1,
        )];

        assert!(select_watched(&events, WATCHED, &watch_set(&[5])).is_empty());
    }

    #[test]
    fn test_events_in_same_tx_merge() {
        let events = vec![
            event(TransferShape::Single, WATCHED, &[6], &[4], 10, 3, 0xa1),
            event(TransferShape::Batch, WATCHED, &[5], &[3], 10, 1, 0xa1),
            event(TransferShape::Single, WATCHED, &[5], &[9], 11, 0, 0xb2),
        ];

        let pending = select_watched(&events, WATCHED, &watch_set(&[5, 6]));
        assert_eq!(pending.len(), 2);

        // Log order within the tx: log 1 (id 5) before log 3 (id 6)
        assert_eq!(pending[0].tx_hash, B256::repeat_byte(0xa1));
        assert_eq!(
            pending[0].transfers,
            vec![
                AssetAmount::new(U256::from(5), U256::from(3)),
                AssetAmount::new(U256::from(6), U256::from(4)),
            ]
        );
        assert_eq!(pending[1].tx_hash, B256::repeat_byte(0xb2));
    }

    #[test]
    fn test_malformed_batch_is_skipped() {
        let events = vec![
            event(TransferShape::Batch, WATCHED, &[5, 6], &[3], 10, 0, 0xa1),
            event(TransferShape::Single, WATCHED, &[5], &[1], 10, 1, 0xb2),
        ];

        let pending = select_watched(&events, WATCHED, &watch_set(&[5, 6]));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].tx_hash, B256::repeat_byte(0xb2));
    }

    #[test]
    fn test_into_record_formats_time_and_total() {
        let pending = PendingTransfer {
            from: Address::repeat_byte(0x01),
            to: WATCHED,
            transfers: vec![
                AssetAmount::new(U256::from(5), U256::from(3)),
                AssetAmount::new(U256::from(6), U256::from(4)),
            ],
            block_number: 150,
            tx_hash: B256::repeat_byte(0xa1),
        };

        let record = pending
            .into_record(1_700_000_000, Address::repeat_byte(0xcc))
            .unwrap();
        assert_eq!(record.total_amount, U256::from(7));
        assert_eq!(record.time, "2023-11-14T22:13:20+00:00");
        assert_eq!(record.contract, Address::repeat_byte(0xcc));
    }
}
