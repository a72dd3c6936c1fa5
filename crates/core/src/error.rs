//! Error types for the core crate.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An asset identifier could not be parsed as a 256-bit unsigned integer.
    #[error("Invalid asset id: {0:?} (expected decimal or 0x-prefixed hex)")]
    InvalidAssetId(String),

    /// The watch-set contains no asset identifiers.
    #[error("Watch-set must contain at least one asset id")]
    EmptyWatchSet,

    /// A batch transfer carried a different number of ids and amounts.
    #[error("Batch transfer has {ids} ids but {amounts} amounts")]
    MismatchedBatch {
        /// Number of asset identifiers in the batch.
        ids: usize,
        /// Number of amounts in the batch.
        amounts: usize,
    },

    /// A transfer record was built with no asset entries.
    #[error("Transfer record for {0} has no asset entries")]
    EmptyTransfer(String),
}

/// Result type alias for CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
