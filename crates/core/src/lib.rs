//! # Transferwatch Core
//!
//! Domain types and range scheduling for the transferwatch ingestion engine.
//!
//! This crate holds everything the engine needs that does not touch the network or
//! the disk, so the same definitions are shared by the indexer, its stores and its tests.
//!
//! ## Features
//!
//! - **Ethereum Types**: Uses Alloy primitives for Address, B256 and U256
//! - **Domain Types**: ScanRange, AssetAmount, TransferRecord, WatchSet
//! - **Range Scheduling**: Contiguous, bounded sub-ranges over a block interval
//! - **Constants**: Defaults shared by configuration and storage

#![warn(missing_docs)]

pub mod constants;
pub mod error;
pub mod range;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use error::{CoreError, Result};
pub use range::{chunks, ScanRanges};
pub use types::*;

// Re-export Alloy primitives for convenience
pub use alloy_primitives::{Address, B256, U256};
