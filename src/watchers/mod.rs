use eyre::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::bridge::L1Client;
use crate::config::Config;
use crate::db::LedgerStore;
use crate::queue::Queue;

pub mod evm;
pub mod l1;

pub use evm::EvmWatcher;
pub use l1::L1Watcher;

/// Drives the L1 Watcher and EVM Watcher concurrently (§4.3, §4.4), following the
/// teacher's `JoinSet` + `tokio::select!` shutdown pattern applied to this chain
/// pair instead of a per-EVM-chain fan-out.
pub struct WatcherManager {
    l1_watcher: L1Watcher,
    evm_watcher: EvmWatcher,
}

impl WatcherManager {
    pub async fn new(
        config: &Config,
        l1_client: Arc<dyn L1Client>,
        ledger: Arc<dyn LedgerStore>,
        queue: Arc<dyn Queue>,
    ) -> Result<Self> {
        let l1_watcher = L1Watcher::new(
            l1_client,
            Arc::clone(&queue),
            config.l1.hot_wallet.clone(),
            config.l1.cold_wallet.clone(),
        );
        let evm_watcher = EvmWatcher::new(&config.evm, ledger, queue).await?;

        info!("watcher manager created");

        Ok(WatcherManager {
            l1_watcher,
            evm_watcher,
        })
    }

    /// Run both watchers concurrently. Returns when either fails or shutdown fires.
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        let mut join_set = tokio::task::JoinSet::new();

        let l1_watcher = self.l1_watcher;
        join_set.spawn(async move { l1_watcher.run().await });

        let evm_watcher = self.evm_watcher;
        join_set.spawn(async move { evm_watcher.run().await });

        tokio::select! {
            _ = shutdown.recv() => {
                info!("shutdown signal received, stopping watchers");
                join_set.abort_all();
                Ok(())
            }
            maybe_done = join_set.join_next() => {
                match maybe_done {
                    Some(Ok(Ok(()))) => {
                        error!("a watcher exited unexpectedly without error");
                        Err(eyre::eyre!("watcher exited unexpectedly"))
                    }
                    Some(Ok(Err(e))) => {
                        error!(error = %e, "a watcher stopped with error");
                        Err(e)
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "a watcher task panicked");
                        Err(eyre::eyre!("watcher task panicked: {}", e))
                    }
                    None => {
                        error!("all watcher tasks exited unexpectedly");
                        Err(eyre::eyre!("all watcher tasks exited unexpectedly"))
                    }
                }
            }
        }
    }
}
