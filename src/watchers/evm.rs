//! EVM Watcher: event listener + catch-up scanner for `SwapToNative` burns on the
//! wrapped-token contract (§4.4).
//!
//! Uses a block-range scanner (`Filter` + `get_logs`, 1000-block catch-up slicing,
//! cursor advance after each slice) watching `SwapToNative(evm, native, amount)`,
//! with the "live" path folded into the same polling loop at
//! `finalized_block - finality_blocks` rather than a second long-lived
//! subscription (§4.4.1).

use alloy::primitives::Address;
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use alloy::transports::http::{Client as HttpClient, Http};
use eyre::{Result, WrapErr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::contracts::evm_bridge::WrappedToken;
use crate::db::LedgerStore;
use crate::queue::Queue;
use crate::rpc_fallback;

const SLICE_SIZE: u64 = 1_000;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct EvmWatcher {
    providers: Vec<RootProvider<Http<HttpClient>>>,
    wtkn_address: Address,
    finality_blocks: u64,
    ledger: Arc<dyn LedgerStore>,
    queue: Arc<dyn Queue>,
}

impl EvmWatcher {
    pub async fn new(
        config: &crate::config::EvmConfig,
        ledger: Arc<dyn LedgerStore>,
        queue: Arc<dyn Queue>,
    ) -> Result<Self> {
        let providers = rpc_fallback::create_providers(&config.all_rpc_urls())?;
        let wtkn_address =
            Address::from_str(&config.wtkn_address).wrap_err("Invalid wTKN address")?;

        Ok(EvmWatcher {
            providers,
            wtkn_address,
            finality_blocks: config.finality_blocks,
            ledger,
            queue,
        })
    }

    /// Try each configured RPC endpoint in order, falling back on failure (§9).
    async fn with_fallback<'a, T, F, Fut>(&'a self, op: F) -> Result<T>
    where
        F: Fn(&'a RootProvider<Http<HttpClient>>) -> Fut,
        Fut: std::future::Future<Output = Result<T>> + 'a,
    {
        let mut last_error = None;
        for provider in &self.providers {
            match op(provider).await {
                Ok(value) => return Ok(value),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| eyre::eyre!("no RPC providers configured")))
    }

    pub async fn run(&self) -> Result<()> {
        loop {
            let last_block = self
                .ledger
                .get_scan_cursor()
                .await
                .map_err(|e| eyre::eyre!("failed to read scan cursor: {}", e))?;
            let finalized = self.finalized_block().await?;

            if finalized as i64 <= last_block {
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }

            let from_block = (last_block + 1) as u64;
            let to_block = finalized.min(from_block + SLICE_SIZE - 1);

            self.process_slice(from_block, to_block).await?;

            self.ledger
                .advance_scan_cursor(to_block as i64)
                .await
                .map_err(|e| eyre::eyre!("failed to advance scan cursor: {}", e))?;

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn process_slice(&self, from_block: u64, to_block: u64) -> Result<()> {
        tracing::info!(from_block, to_block, "scanning wTKN burns");

        let filter = Filter::new()
            .address(self.wtkn_address)
            .from_block(from_block)
            .to_block(to_block)
            .event_signature(WrappedToken::SwapToNative::SIGNATURE_HASH);

        let logs = self
            .with_fallback(|p| {
                let filter = filter.clone();
                async move { p.get_logs(&filter).await.wrap_err("Failed to get logs") }
            })
            .await?;

        for log in logs {
            let block_timestamp = log.block_timestamp.unwrap_or(0) as i64;
            let tx_hash = log
                .transaction_hash
                .ok_or_else(|| eyre::eyre!("missing transaction hash"))?;

            let event = match log.log_decode::<WrappedToken::SwapToNative>() {
                Ok(decoded) => decoded.inner.data,
                Err(e) => {
                    tracing::error!(tx_hash = %tx_hash, error = %e, "failed to decode SwapToNative log");
                    continue;
                }
            };

            let payload = serde_json::json!({
                "evm": format!("{:#x}", event.evm),
                "native": event.native,
                "amount": event.amount.to_string(),
                "ts": block_timestamp * 1000,
                "hash": format!("{:#x}", tx_hash),
            });

            let id = format!("swap-to-native-{:#x}-{:#x}", event.evm, tx_hash);
            self.queue
                .enqueue("swap-to-native", &id, payload, Duration::ZERO, 3)
                .await
                .map_err(|e| eyre::eyre!("failed to enqueue swap-to-native job: {}", e))?;
        }

        Ok(())
    }

    async fn finalized_block(&self) -> Result<u64> {
        let block = self
            .with_fallback(|p| async move {
                p.get_block_number()
                    .await
                    .wrap_err("Failed to get block number")
            })
            .await?;
        Ok(block.saturating_sub(self.finality_blocks))
    }
}
