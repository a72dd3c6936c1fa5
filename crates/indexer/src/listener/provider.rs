//! RPC provider wrapper for Ethereum communication.

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, Filter, Log};
use alloy::transports::http::{Client, Http};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use transferwatch_core::ScanRange;

use super::client::{ChainClient, RawTransfer, TransferShape};

/// HTTP RPC provider for querying Ethereum.
#[derive(Clone)]
pub struct RpcProvider {
    provider: RootProvider<Http<Client>>,
    timeout: Duration,
}

impl RpcProvider {
    /// Create a new RPC provider whose calls give up after `timeout`.
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let url = rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;

        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self { provider, timeout })
    }

    async fn bounded<T, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| anyhow::anyhow!("{} timed out after {:?}", what, self.timeout))?
    }
}

#[async_trait]
impl ChainClient for RpcProvider {
    async fn current_height(&self) -> Result<u64> {
        self.bounded("eth_blockNumber", async {
            self.provider
                .get_block_number()
                .await
                .context("Failed to get block number")
        })
        .await
    }

    async fn transfer_events(
        &self,
        contract: Address,
        shape: TransferShape,
        range: ScanRange,
    ) -> Result<Vec<RawTransfer>> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(shape.signature_hash())
            .from_block(range.start)
            .to_block(range.end);

        let logs: Vec<Log> = self
            .bounded("eth_getLogs", async {
                self.provider
                    .get_logs(&filter)
                    .await
                    .with_context(|| {
                        format!("Failed to fetch {} transfer logs for {}", shape.as_str(), range)
                    })
            })
            .await?;

        // Undecodable logs are skipped so one bad entry cannot stall the range
        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match RawTransfer::from_log(shape, log) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!("Skipping {} transfer log: {:#}", shape.as_str(), e);
                }
            }
        }

        Ok(events)
    }

    async fn block_timestamp(&self, height: u64) -> Result<u64> {
        let block = self
            .bounded("eth_getBlockByNumber", async {
                self.provider
                    .get_block_by_number(
                        BlockNumberOrTag::Number(height),
                        BlockTransactionsKind::Hashes,
                    )
                    .await
                    .with_context(|| format!("Failed to fetch block {}", height))
            })
            .await?
            .with_context(|| format!("Block {} not found", height))?;

        Ok(block.header.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_url() {
        assert!(RpcProvider::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_errors_instead_of_hanging() {
        // Port 9 (discard) on loopback: connection refused or dropped, either way an error
        let provider =
            RpcProvider::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(provider.current_height().await.is_err());
    }
}
