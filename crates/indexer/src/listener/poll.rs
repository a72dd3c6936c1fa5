//! Live polling once backfill has caught up.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};
use transferwatch_core::chunks;

use super::client::ChainClient;
use super::filter::{ScanSummary, TransferFilter};
use crate::config::WatchConfig;
use crate::storage::CheckpointStore;

/// Result of one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing new has matured past the confirmation depth.
    Idle {
        /// `head - confirmations` at the time of the tick.
        safe_head: u64,
    },
    /// Blocks `from..=to` were scanned and the checkpoint moved to `to`.
    Advanced {
        /// First block scanned.
        from: u64,
        /// Last block scanned (the new checkpoint).
        to: u64,
        /// Records appended during the tick.
        inserted: usize,
    },
}

/// Timer-driven poller that scans newly confirmed blocks.
///
/// Ticks are strictly sequential: the next tick is scheduled only after the previous
/// one finishes, so a slow tick delays the following one instead of overlapping it.
pub struct LivePoller {
    client: Arc<dyn ChainClient>,
    checkpoint: Arc<dyn CheckpointStore>,
    filter: TransferFilter,
    watch: Arc<WatchConfig>,
    last_processed: u64,
}

impl LivePoller {
    /// Create a poller that resumes after `last_processed`.
    pub fn new(
        client: Arc<dyn ChainClient>,
        checkpoint: Arc<dyn CheckpointStore>,
        filter: TransferFilter,
        watch: Arc<WatchConfig>,
        last_processed: u64,
    ) -> Self {
        Self {
            client,
            checkpoint,
            filter,
            watch,
            last_processed,
        }
    }

    /// Last block whose events are committed.
    pub fn last_processed(&self) -> u64 {
        self.last_processed
    }

    /// Run one tick.
    ///
    /// Scans `last_processed + 1 ..= head - confirmations` and persists the checkpoint
    /// once at the end. On error `last_processed` is left unchanged.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let head = self
            .client
            .current_height()
            .await
            .context("Failed to get head block")?;
        let safe_head = head.saturating_sub(self.watch.confirmations);

        if safe_head <= self.last_processed {
            return Ok(TickOutcome::Idle { safe_head });
        }

        let from = self.last_processed + 1;
        let mut total = ScanSummary::default();
        for range in chunks(from, safe_head, self.watch.batch_size) {
            let summary = self
                .filter
                .scan(range)
                .await
                .with_context(|| format!("Poll failed in range {}", range))?;

            debug!(
                "Poll range {}: {} events, {} matched, {} new",
                range, summary.events_seen, summary.transactions_matched, summary.records_inserted
            );
            total.events_seen += summary.events_seen;
            total.transactions_matched += summary.transactions_matched;
            total.records_inserted += summary.records_inserted;
            total.duplicates_skipped += summary.duplicates_skipped;
        }

        self.checkpoint
            .save(safe_head)
            .await
            .with_context(|| format!("Failed to save checkpoint {}", safe_head))?;
        self.last_processed = safe_head;

        info!(
            "Scanned blocks {}..={} (head {}): {} events, {} matched, {} new",
            from,
            safe_head,
            head,
            total.events_seen,
            total.transactions_matched,
            total.records_inserted
        );

        Ok(TickOutcome::Advanced {
            from,
            to: safe_head,
            inserted: total.records_inserted,
        })
    }

    /// Tick forever, sleeping `poll_interval` after each tick completes.
    ///
    /// Tick failures are logged and retried on the next tick; they never end the loop.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Live polling from block {} every {:?} ({} confirmations)",
            self.last_processed + 1,
            self.watch.poll_interval,
            self.watch.confirmations
        );

        loop {
            match self.tick().await {
                Ok(TickOutcome::Idle { safe_head }) => {
                    debug!(
                        "No new confirmed blocks (safe head {}, last processed {})",
                        safe_head, self.last_processed
                    );
                }
                Ok(TickOutcome::Advanced { .. }) => {}
                Err(e) => {
                    warn!(
                        "Poll tick failed, retrying in {:?}: {:#}",
                        self.watch.poll_interval, e
                    );
                }
            }

            tokio::time::sleep(self.watch.poll_interval).await;
        }
    }
}
