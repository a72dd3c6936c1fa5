//! ERC-1155 transfer ingestion for transferwatch.
//!
//! This crate provides:
//! - A chain client abstraction with an alloy JSON-RPC implementation
//! - Transfer filtering (receiver + watched asset ids) and normalization
//! - Idempotent record storage (JSON files or SQLite)
//! - Resumable historical backfill followed by confirmation-aware live polling
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  transferwatch-indexer (this)        │
//! │                                      │
//! │  ┌──────────────┐                    │
//! │  │ RpcProvider  │ ← Ethereum RPC     │
//! │  │ (ChainClient)│   TransferSingle   │
//! │  └──────┬───────┘   TransferBatch    │
//! │         │                            │
//! │  ┌──────▼───────┐   ┌─────────────┐  │
//! │  │  Backfill    │──▶│ LivePoller  │  │
//! │  │  (one-shot)  │   │ (tokio loop)│  │
//! │  └──────┬───────┘   └──────┬──────┘  │
//! │         │  chunks()        │         │
//! │         └───────┬──────────┘         │
//! │          ┌──────▼────────┐           │
//! │          │TransferFilter │           │
//! │          └──────┬────────┘           │
//! │                 │                    │
//! │   ┌─────────────▼──────────────┐     │
//! │   │ CheckpointStore/RecordStore│     │
//! │   │   JSON files  |  SQLite    │     │
//! │   └────────────────────────────┘     │
//! └──────────────────────────────────────┘
//!            │
//!            ▼
//!   transfers (most recent first) + checkpoint,
//!   read by alerting tools and operators
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod listener;
pub mod storage;

// Re-export common types
pub use transferwatch_core::*;
