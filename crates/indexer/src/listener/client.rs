//! Chain client abstraction consumed by the ingestion engine.

use alloy::primitives::{Address, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use transferwatch_core::{AssetAmount, CoreError, ScanRange};

/// Shape of a transfer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferShape {
    /// One (id, amount) pair per event (ERC-1155 `TransferSingle`).
    Single,
    /// Parallel id and amount lists (ERC-1155 `TransferBatch`).
    Batch,
}

impl TransferShape {
    /// All shapes the filter queries for each range.
    pub const ALL: [TransferShape; 2] = [TransferShape::Single, TransferShape::Batch];

    /// Short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferShape::Single => "single",
            TransferShape::Batch => "batch",
        }
    }
}

/// A decoded transfer event with its block coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransfer {
    /// Event shape the transfer was decoded from.
    pub shape: TransferShape,

    /// Sender address.
    pub from: Address,

    /// Receiver address.
    pub to: Address,

    /// Asset ids (one element for single transfers).
    pub ids: Vec<U256>,

    /// Amounts, parallel to `ids`.
    pub amounts: Vec<U256>,

    /// Block number where the event occurred.
    pub block_number: u64,

    /// Transaction hash.
    pub tx_hash: B256,

    /// Log index within the block.
    pub log_index: u64,
}

impl RawTransfer {
    /// Pair up ids and amounts.
    ///
    /// Fails if the lists differ in length.
    pub fn entries(&self) -> Result<Vec<AssetAmount>, CoreError> {
        if self.ids.len() != self.amounts.len() {
            return Err(CoreError::MismatchedBatch {
                ids: self.ids.len(),
                amounts: self.amounts.len(),
            });
        }

        Ok(self
            .ids
            .iter()
            .zip(&self.amounts)
            .map(|(id, amount)| AssetAmount::new(*id, *amount))
            .collect())
    }
}

/// Read access to the ledger.
///
/// Implementations should bound every call with a timeout; errors are treated as
/// transient by callers and never advance a checkpoint.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current head block number.
    async fn current_height(&self) -> Result<u64>;

    /// All transfer events of `shape` emitted by `contract` within `range`.
    async fn transfer_events(
        &self,
        contract: Address,
        shape: TransferShape,
        range: ScanRange,
    ) -> Result<Vec<RawTransfer>>;

    /// Timestamp (unix seconds) of block `height`.
    async fn block_timestamp(&self, height: u64) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(ids: Vec<u64>, amounts: Vec<u64>) -> RawTransfer {
        RawTransfer {
            shape: TransferShape::Batch,
            from: Address::repeat_byte(0x01),
            to: Address::repeat_byte(0x02),
            ids: ids.into_iter().map(U256::from).collect(),
            amounts: amounts.into_iter().map(U256::from).collect(),
            block_number: 1,
            tx_hash: B256::repeat_byte(0xaa),
            log_index: 0,
        }
    }

    #[test]
    fn test_entries_pairs_ids_with_amounts() {
        let entries = raw(vec![5, 999], vec![3, 7]).entries().unwrap();
        assert_eq!(
            entries,
            vec![
                AssetAmount::new(U256::from(5), U256::from(3)),
                AssetAmount::new(U256::from(999), U256::from(7)),
            ]
        );
    }

    #[test]
    fn test_entries_rejects_mismatched_lengths() {
        let err = raw(vec![1, 2], vec![3]).entries().unwrap_err();
        assert_eq!(err, CoreError::MismatchedBatch { ids: 2, amounts: 1 });
    }
}
