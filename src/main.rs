mod address_codec;
mod api;
mod blacklist;
mod bounded_cache;
mod bridge;
mod config;
mod contracts;
mod db;
mod evm_client;
mod hash;
mod l1_client;
mod metrics;
mod queue;
mod rebalance;
mod rpc_fallback;
mod types;
mod watchers;

use std::sync::Arc;

use bridge::handlers::{
    DepositJobHandler, SwapToNativeJobHandler, SwapToWrappedJobHandler, WithdrawalJobHandler,
};
use bridge::{BridgeService, Eip191Verifier};
use config::Config;
use db::{LedgerStore, PostgresLedgerStore};
use queue::{PostgresQueue, Queue};
use watchers::WatcherManager;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    tracing::info!("starting bridge backend");

    let config = Config::load()?;
    tracing::info!(evm_chain_id = config.evm.chain_id, "configuration loaded");

    let db_pool = db::create_pool(&config.database.url).await?;
    db::run_migrations(&db_pool).await?;
    tracing::info!("database connected and migrated");

    let ledger: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(db_pool.clone()));
    let queue = Arc::new(PostgresQueue::new(db_pool.clone()));
    let l1_client: Arc<dyn bridge::L1Client> = Arc::new(l1_client::NanoNodeL1Client::new(&config.l1));
    let evm_client: Arc<dyn bridge::EvmClient> = Arc::new(evm_client::AlloyEvmClient::new(&config.evm)?);
    let blacklist = Arc::new(blacklist::HttpBlacklistOracle::new(config.fees.blacklist_url.clone()));
    let verifier = Arc::new(Eip191Verifier);

    let bridge = Arc::new(BridgeService::new(
        Arc::clone(&ledger),
        queue.clone() as Arc<dyn Queue>,
        Arc::clone(&l1_client),
        Arc::clone(&evm_client),
        blacklist,
        verifier,
        config.l1.symbol.clone(),
        crate::types::AtomicUnits::from_u64(config.l1.hot_minimum),
        config.l1.hot_cold_ratio,
    ));

    queue
        .register_processor(
            "deposit",
            Arc::new(DepositJobHandler { bridge: Arc::clone(&bridge) }),
        )
        .await;
    queue
        .register_processor(
            "swap-to-native",
            Arc::new(SwapToNativeJobHandler { bridge: Arc::clone(&bridge) }),
        )
        .await;
    queue
        .register_processor(
            "withdrawal",
            Arc::new(WithdrawalJobHandler { bridge: Arc::clone(&bridge) }),
        )
        .await;
    queue
        .register_processor(
            "swap-to-wrapped",
            Arc::new(SwapToWrappedJobHandler { bridge: Arc::clone(&bridge) }),
        )
        .await;

    let watcher_manager = WatcherManager::new(&config, l1_client, ledger, queue.clone() as Arc<dyn Queue>).await?;

    let (watcher_shutdown_tx, watcher_shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    let (queue_shutdown_tx, queue_shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = watcher_shutdown_tx.send(()).await;
        let _ = queue_shutdown_tx.send(true);
    });

    let http_bridge = Arc::clone(&bridge);
    let bind_address = config.server.bind_address.clone();
    let port = config.server.port;
    let hot_wallet = config.l1.hot_wallet.clone();
    tokio::spawn(async move {
        if let Err(e) = api::serve(&bind_address, port, http_bridge, hot_wallet).await {
            tracing::error!(error = %e, "HTTP API server error");
        }
    });

    let queue_runner = queue.clone();
    tokio::select! {
        result = watcher_manager.run(watcher_shutdown_rx) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "watcher manager error");
            }
        }
        result = queue_runner.run(queue_shutdown_rx) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "queue runner error");
            }
        }
    }

    tracing::info!("bridge backend stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,pawbridge=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
    }
}
