//! Sync engine: historical backfill followed by live polling.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use super::backfill::Backfill;
use super::client::ChainClient;
use super::filter::TransferFilter;
use super::poll::LivePoller;
use crate::config::WatchConfig;
use crate::storage::Stores;

/// Sync engine owns the single scanning timeline for one watched contract.
///
/// Backfill and polling never overlap: polling starts only after the backfill pass
/// returns, seeded with the head it observed.
pub struct SyncEngine {
    client: Arc<dyn ChainClient>,
    stores: Stores,
    watch: Arc<WatchConfig>,
}

impl SyncEngine {
    /// Create a new sync engine.
    pub fn new(client: Arc<dyn ChainClient>, stores: Stores, watch: WatchConfig) -> Self {
        Self {
            client,
            stores,
            watch: Arc::new(watch),
        }
    }

    fn filter(&self) -> TransferFilter {
        TransferFilter::new(
            self.client.clone(),
            self.stores.records.clone(),
            self.watch.clone(),
        )
    }

    /// Run the one-shot historical pass. Returns the head it scanned up to.
    pub async fn backfill(&self) -> Result<u64> {
        Backfill::new(
            self.client.clone(),
            self.stores.checkpoint.clone(),
            self.filter(),
            self.watch.clone(),
        )
        .run()
        .await
    }

    /// Build the live poller, resuming after `last_processed`.
    ///
    /// Callers pass the height returned by [`SyncEngine::backfill`], which never lies
    /// below the stored checkpoint.
    pub fn poller(&self, last_processed: u64) -> LivePoller {
        LivePoller::new(
            self.client.clone(),
            self.stores.checkpoint.clone(),
            self.filter(),
            self.watch.clone(),
            last_processed,
        )
    }

    /// Run the sync loop (historical + live).
    ///
    /// Returns only if backfill fails; an incomplete backfill never falls through to
    /// live polling.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Sync engine starting: account={} contract={} watch_set={}",
            self.watch.account, self.watch.contract, self.watch.watch_set
        );

        let head = self.backfill().await.context("Historical backfill failed")?;

        self.poller(head).run().await
    }
}
