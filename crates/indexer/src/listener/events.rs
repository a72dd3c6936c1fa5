//! Event type definitions for ERC-1155 transfer events.

use alloy::primitives::B256;
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use anyhow::{Context, Result};

use super::client::{RawTransfer, TransferShape};

// Define the ERC-1155 transfer events using Alloy's sol! macro
sol! {
    /// ERC-1155 single transfer
    #[derive(Debug, PartialEq, Eq)]
    event TransferSingle(
        address indexed operator,
        address indexed from,
        address indexed to,
        uint256 id,
        uint256 value
    );

    /// ERC-1155 batch transfer
    #[derive(Debug, PartialEq, Eq)]
    event TransferBatch(
        address indexed operator,
        address indexed from,
        address indexed to,
        uint256[] ids,
        uint256[] values
    );
}

impl TransferShape {
    /// Topic0 of the event for this shape.
    pub fn signature_hash(&self) -> B256 {
        match self {
            TransferShape::Single => TransferSingle::SIGNATURE_HASH,
            TransferShape::Batch => TransferBatch::SIGNATURE_HASH,
        }
    }
}

/// Block coordinates carried by every log we accept.
struct LogCoordinates {
    block_number: u64,
    tx_hash: B256,
    log_index: u64,
}

impl LogCoordinates {
    fn from_log(log: &Log) -> Result<Self> {
        Ok(Self {
            block_number: log.block_number.context("Log missing block_number")?,
            tx_hash: log
                .transaction_hash
                .context("Log missing transaction_hash")?,
            log_index: log.log_index.context("Log missing log_index")?,
        })
    }
}

impl RawTransfer {
    /// Parse a log of the given shape.
    pub fn from_log(shape: TransferShape, log: &Log) -> Result<Self> {
        match shape {
            TransferShape::Single => Self::from_single_log(log),
            TransferShape::Batch => Self::from_batch_log(log),
        }
    }

    /// Parse a `TransferSingle` log.
    pub fn from_single_log(log: &Log) -> Result<Self> {
        let event = TransferSingle::decode_log(log.as_ref(), true)
            .context("Failed to decode TransferSingle event")?;
        let coords = LogCoordinates::from_log(log)?;

        Ok(Self {
            shape: TransferShape::Single,
            from: event.from,
            to: event.to,
            ids: vec![event.id],
            amounts: vec![event.value],
            block_number: coords.block_number,
            tx_hash: coords.tx_hash,
            log_index: coords.log_index,
        })
    }

    /// Parse a `TransferBatch` log.
    ///
    /// Rejects batches whose id and value lists differ in length.
    pub fn from_batch_log(log: &Log) -> Result<Self> {
        let event = TransferBatch::decode_log(log.as_ref(), true)
            .context("Failed to decode TransferBatch event")?;
        let coords = LogCoordinates::from_log(log)?;

        let raw = Self {
            shape: TransferShape::Batch,
            from: event.from,
            to: event.to,
            ids: event.ids.clone(),
            amounts: event.values.clone(),
            block_number: coords.block_number,
            tx_hash: coords.tx_hash,
            log_index: coords.log_index,
        };
        raw.entries()
            .with_context(|| format!("Malformed TransferBatch in tx {}", raw.tx_hash))?;

        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{keccak256, Address, LogData, U256};

    fn rpc_log(address: Address, data: LogData, block_number: u64, log_index: u64) -> Log {
        Log {
            inner: alloy::primitives::Log { address, data },
            block_hash: Some(B256::repeat_byte(0x11)),
            block_number: Some(block_number),
            block_timestamp: None,
            transaction_hash: Some(B256::repeat_byte(0xaa)),
            transaction_index: Some(0),
            log_index: Some(log_index),
            removed: false,
        }
    }

    #[test]
    fn test_signature_hashes() {
        assert_eq!(
            TransferShape::Single.signature_hash(),
            keccak256("TransferSingle(address,address,address,uint256,uint256)")
        );
        assert_eq!(
            TransferShape::Batch.signature_hash(),
            keccak256("TransferBatch(address,address,address,uint256[],uint256[])")
        );
    }

    #[test]
    fn test_parse_single_log() {
        let event = TransferSingle {
            operator: Address::repeat_byte(0x01),
            from: Address::repeat_byte(0x02),
            to: Address::repeat_byte(0x03),
            id: U256::from(7),
            value: U256::from(12),
        };
        let log = rpc_log(Address::repeat_byte(0x99), event.encode_log_data(), 150, 4);

        let raw = RawTransfer::from_log(TransferShape::Single, &log).unwrap();
        assert_eq!(raw.shape, TransferShape::Single);
        assert_eq!(raw.from, Address::repeat_byte(0x02));
        assert_eq!(raw.to, Address::repeat_byte(0x03));
        assert_eq!(raw.ids, vec![U256::from(7)]);
        assert_eq!(raw.amounts, vec![U256::from(12)]);
        assert_eq!(raw.block_number, 150);
        assert_eq!(raw.log_index, 4);
        assert_eq!(raw.tx_hash, B256::repeat_byte(0xaa));
    }

    #[test]
    fn test_parse_batch_log() {
        let event = TransferBatch {
            operator: Address::repeat_byte(0x01),
            from: Address::repeat_byte(0x02),
            to: Address::repeat_byte(0x03),
            ids: vec![U256::from(5), U256::from(999)],
            values: vec![U256::from(3), U256::from(7)],
        };
        let log = rpc_log(Address::repeat_byte(0x99), event.encode_log_data(), 88, 0);

        let raw = RawTransfer::from_log(TransferShape::Batch, &log).unwrap();
        assert_eq!(raw.shape, TransferShape::Batch);
        assert_eq!(raw.ids, vec![U256::from(5), U256::from(999)]);
        assert_eq!(raw.amounts, vec![U256::from(3), U256::from(7)]);
    }

    #[test]
    fn test_parse_rejects_mismatched_batch() {
        let event = TransferBatch {
            operator: Address::repeat_byte(0x01),
            from: Address::repeat_byte(0x02),
            to: Address::repeat_byte(0x03),
            ids: vec![U256::from(5), U256::from(6)],
            values: vec![U256::from(3)],
        };
        let log = rpc_log(Address::repeat_byte(0x99), event.encode_log_data(), 88, 0);

        assert!(RawTransfer::from_log(TransferShape::Batch, &log).is_err());
    }

    #[test]
    fn test_parse_requires_coordinates() {
        let event = TransferSingle {
            operator: Address::ZERO,
            from: Address::ZERO,
            to: Address::repeat_byte(0x03),
            id: U256::from(1),
            value: U256::from(1),
        };
        let mut log = rpc_log(Address::repeat_byte(0x99), event.encode_log_data(), 1, 0);
        log.transaction_hash = None;

        let err = RawTransfer::from_log(TransferShape::Single, &log).unwrap_err();
        assert!(err.to_string().contains("transaction_hash"));
    }

    #[test]
    fn test_wrong_shape_fails_to_decode() {
        let event = TransferSingle {
            operator: Address::ZERO,
            from: Address::ZERO,
            to: Address::repeat_byte(0x03),
            id: U256::from(1),
            value: U256::from(1),
        };
        let log = rpc_log(Address::repeat_byte(0x99), event.encode_log_data(), 1, 0);

        assert!(RawTransfer::from_log(TransferShape::Batch, &log).is_err());
    }
}
