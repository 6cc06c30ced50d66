//! L1 Watcher: websocket confirmation stream + periodic sweep feeding the deposit
//! pipeline (§4.3).
//!
//! One task per source (websocket stream, periodic sweep), run under a `JoinSet`
//! against a shutdown signal, same shape `watchers::WatcherManager` uses to fan
//! out across watchers, applied here within a single watcher's two deposit sources.

use eyre::Result;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::bridge::{L1Client, L1Confirmation};
use crate::queue::Queue;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// L1 raw-unit precision exceeds the 9-decimal atomic-unit representation the Bridge
/// Service tracks; §4.3 strips the 9 least-significant digits before handing a
/// deposit job off.
const RAW_STRIP_DIVISOR: u128 = 1_000_000_000;

pub struct L1Watcher {
    l1: Arc<dyn L1Client>,
    queue: Arc<dyn Queue>,
    hot_wallet: String,
    cold_wallet: String,
}

impl L1Watcher {
    pub fn new(
        l1: Arc<dyn L1Client>,
        queue: Arc<dyn Queue>,
        hot_wallet: String,
        cold_wallet: String,
    ) -> Self {
        L1Watcher {
            l1,
            queue,
            hot_wallet,
            cold_wallet,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let mut set = tokio::task::JoinSet::new();

        {
            let l1 = Arc::clone(&self.l1);
            let queue = Arc::clone(&self.queue);
            let hot_wallet = self.hot_wallet.clone();
            let cold_wallet = self.cold_wallet.clone();
            set.spawn(async move {
                Self::run_stream(l1, queue, hot_wallet, cold_wallet).await
            });
        }
        {
            let l1 = Arc::clone(&self.l1);
            let queue = Arc::clone(&self.queue);
            let hot_wallet = self.hot_wallet.clone();
            let cold_wallet = self.cold_wallet.clone();
            set.spawn(async move {
                Self::run_sweep(l1, queue, hot_wallet, cold_wallet).await
            });
        }

        match set.join_next().await {
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(eyre::eyre!("L1 watcher task panicked: {}", e)),
            _ => {
                error!("an L1 watcher source exited unexpectedly");
                Err(eyre::eyre!("L1 watcher source exited unexpectedly"))
            }
        }
    }

    async fn run_stream(
        l1: Arc<dyn L1Client>,
        queue: Arc<dyn Queue>,
        hot_wallet: String,
        cold_wallet: String,
    ) -> Result<()> {
        let mut stream = l1.subscribe_confirmations();
        while let Some(confirmation) = stream.next().await {
            if let Err(e) =
                classify_and_dispatch(l1.as_ref(), queue.as_ref(), &hot_wallet, &cold_wallet, confirmation)
                    .await
            {
                warn!(error = %e, "failed to process L1 confirmation");
            }
        }
        Err(eyre::eyre!("L1 confirmation stream ended"))
    }

    async fn run_sweep(
        l1: Arc<dyn L1Client>,
        queue: Arc<dyn Queue>,
        hot_wallet: String,
        cold_wallet: String,
    ) -> Result<()> {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let pending = match l1.list_pending_receivables().await {
                Ok(pending) => pending,
                Err(e) => {
                    warn!(error = %e, "sweep failed to list pending receivables");
                    continue;
                }
            };
            info!(count = pending.len(), "sweep found pending receivables");
            for confirmation in pending {
                if let Err(e) = classify_and_dispatch(
                    l1.as_ref(),
                    queue.as_ref(),
                    &hot_wallet,
                    &cold_wallet,
                    confirmation,
                )
                .await
                {
                    warn!(error = %e, "failed to process swept receivable");
                }
            }
        }
    }
}

async fn classify_and_dispatch(
    l1: &dyn L1Client,
    queue: &dyn Queue,
    hot_wallet: &str,
    cold_wallet: &str,
    confirmation: L1Confirmation,
) -> Result<()> {
    if confirmation.sender == hot_wallet || confirmation.sender == cold_wallet {
        l1.receive(&confirmation.hash).await?;
        return Ok(());
    }

    if confirmation.receiver != hot_wallet {
        info!(receiver = %confirmation.receiver, "ignoring confirmation not addressed to hot wallet");
        return Ok(());
    }

    let amount = confirmation.raw_amount / RAW_STRIP_DIVISOR;
    let payload = serde_json::json!({
        "sender": confirmation.sender,
        "amount": amount.to_string(),
        "ts": chrono::Utc::now().timestamp_millis(),
        "hash": confirmation.hash,
    });
    let id = format!("deposit-{}", confirmation.hash);
    queue
        .enqueue("deposit", &id, payload, Duration::ZERO, 5)
        .await
        .map_err(|e| eyre::eyre!("failed to enqueue deposit job: {}", e))
}
