//! Core types for transferwatch.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Inclusive block interval `[start, end]` handed to one filter pass.
///
/// Produced by [`crate::chunks`] and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanRange {
    /// First block of the range.
    pub start: u64,
    /// Last block of the range (inclusive).
    pub end: u64,
}

impl ScanRange {
    /// Create a new range.
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of blocks covered by the range.
    pub const fn block_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Whether `height` lies inside the range.
    pub const fn contains(&self, height: u64) -> bool {
        self.start <= height && height <= self.end
    }
}

impl fmt::Display for ScanRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// One (asset id, amount) pair of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    /// Token id within the watched contract.
    pub asset_id: U256,
    /// Number of units moved.
    pub amount: U256,
}

impl AssetAmount {
    /// Create a new pair.
    pub const fn new(asset_id: U256, amount: U256) -> Self {
        Self { asset_id, amount }
    }
}

/// A watch-matching transfer, one per transaction.
///
/// Records are created once by the transfer filter and never mutated afterwards.
/// Uniqueness is by `tx_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Sender of the (first matching) transfer in the transaction.
    pub from: Address,

    /// Receiver, always the watched account.
    pub to: Address,

    /// Watched asset entries retained from the transaction, in log order.
    pub transfers: Vec<AssetAmount>,

    /// Sum of `transfers[*].amount`.
    pub total_amount: U256,

    /// Block containing the transaction.
    pub block_number: u64,

    /// Transaction hash (uniqueness key).
    pub tx_hash: B256,

    /// Block timestamp, unix seconds.
    pub timestamp: u64,

    /// Block timestamp, RFC 3339 UTC.
    pub time: String,

    /// Contract that emitted the transfer events.
    pub contract: Address,
}

impl TransferRecord {
    /// Build a record, deriving `total_amount` from the entries.
    ///
    /// Fails if `transfers` is empty: a transaction with no watched entries is never recorded.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        from: Address,
        to: Address,
        transfers: Vec<AssetAmount>,
        block_number: u64,
        tx_hash: B256,
        timestamp: u64,
        time: String,
        contract: Address,
    ) -> Result<Self, CoreError> {
        if transfers.is_empty() {
            return Err(CoreError::EmptyTransfer(tx_hash.to_string()));
        }

        let total_amount = total_amount(&transfers);

        Ok(Self {
            from,
            to,
            transfers,
            total_amount,
            block_number,
            tx_hash,
            timestamp,
            time,
            contract,
        })
    }

    /// Asset ids carried by this record, in entry order.
    pub fn asset_ids(&self) -> Vec<U256> {
        self.transfers.iter().map(|t| t.asset_id).collect()
    }
}

/// Saturating sum of the amounts of `entries`.
pub fn total_amount(entries: &[AssetAmount]) -> U256 {
    entries
        .iter()
        .fold(U256::ZERO, |acc, entry| acc.saturating_add(entry.amount))
}

/// Sort records most recent first (descending block number, then tx hash for stability).
pub fn sort_most_recent_first(records: &mut [TransferRecord]) {
    records.sort_by(|a, b| {
        b.block_number
            .cmp(&a.block_number)
            .then_with(|| a.tx_hash.cmp(&b.tx_hash))
    });
}

/// The set of asset ids the engine records transfers for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSet(BTreeSet<U256>);

impl WatchSet {
    /// Create a watch-set from ids. Fails if no ids are given.
    pub fn new(ids: impl IntoIterator<Item = U256>) -> Result<Self, CoreError> {
        let set: BTreeSet<U256> = ids.into_iter().collect();
        if set.is_empty() {
            return Err(CoreError::EmptyWatchSet);
        }
        Ok(Self(set))
    }

    /// Parse ids given as decimal or `0x`-prefixed hex strings.
    pub fn parse<S: AsRef<str>>(ids: &[S]) -> Result<Self, CoreError> {
        let parsed = ids
            .iter()
            .map(|id| parse_asset_id(id.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(parsed)
    }

    /// Whether `asset_id` is watched.
    pub fn contains(&self, asset_id: &U256) -> bool {
        self.0.contains(asset_id)
    }

    /// Iterate watched ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &U256> {
        self.0.iter()
    }
}

impl fmt::Display for WatchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.iter().map(|id| id.to_string()).collect();
        write!(f, "{{{}}}", ids.join(", "))
    }
}

/// Parse one asset id (decimal or `0x`-prefixed hex).
pub fn parse_asset_id(raw: &str) -> Result<U256, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidAssetId(raw.to_string()));
    }
    U256::from_str(trimmed).map_err(|_| CoreError::InvalidAssetId(raw.to_string()))
}
