//! Defaults shared across the engine.
//!
//! Configuration falls back to these when a field is omitted.

/// Default number of trailing blocks treated as not yet final.
pub const DEFAULT_CONFIRMATIONS: u64 = 6;

/// Default maximum sub-range width (`end - start`) for a single log query.
pub const DEFAULT_BATCH_SIZE: u64 = 2_000;

/// Default number of blocks behind the head to start from on a fresh install.
pub const DEFAULT_LOOKBACK_BLOCKS: u64 = 100_000;

/// Default delay between live poll ticks, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 12;

/// Default timeout applied to each chain client call, in seconds.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;
