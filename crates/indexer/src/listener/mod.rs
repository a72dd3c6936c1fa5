//! Event listener for ERC-1155 transfers to the watched account.
//!
//! This module provides:
//! - The chain client abstraction and its alloy-backed RPC implementation
//! - Event type definitions and parsing
//! - The transfer filter that turns raw events into stored records
//! - Historical backfill and live polling, combined by the sync engine

pub mod backfill;
pub mod client;
pub mod events;
pub mod filter;
pub mod poll;
pub mod provider;
pub mod sync;

pub use backfill::Backfill;
pub use client::{ChainClient, RawTransfer, TransferShape};
pub use filter::{ScanSummary, TransferFilter};
pub use poll::{LivePoller, TickOutcome};
pub use provider::RpcProvider;
pub use sync::SyncEngine;
