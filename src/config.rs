#![allow(dead_code)]

use eyre::{eyre, Result, WrapErr};
use std::env;
use std::fmt;
use std::path::Path;

/// Top-level configuration for the bridge backend.
#[derive(Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub l1: L1Config,
    pub evm: EvmConfig,
    pub fees: FeeConfig,
    pub server: ServerConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database", &self.database)
            .field("l1", &self.l1)
            .field("evm", &self.evm)
            .field("fees", &self.fees)
            .field("server", &self.server)
            .finish()
    }
}

/// Database configuration.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .finish()
    }
}

/// L1 ledger configuration (native-coin account chain: hot/cold wallet, node endpoints).
#[derive(Clone)]
pub struct L1Config {
    pub ws_url: String,
    pub rpc_url: String,
    pub hot_wallet: String,
    pub cold_wallet: String,
    pub hot_wallet_key: String,
    /// Minimum hot-wallet balance to retain after a rebalancing sweep (§4.6 M).
    pub hot_minimum: u64,
    /// Target hot/cold ratio used by the rebalancing sweep, 0.0..=1.0 (§4.6 r).
    pub hot_cold_ratio: f64,
    pub symbol: String,
}

impl fmt::Debug for L1Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("L1Config")
            .field("ws_url", &self.ws_url)
            .field("rpc_url", &self.rpc_url)
            .field("hot_wallet", &self.hot_wallet)
            .field("cold_wallet", &self.cold_wallet)
            .field("hot_wallet_key", &"<redacted>")
            .field("hot_minimum", &self.hot_minimum)
            .field("hot_cold_ratio", &self.hot_cold_ratio)
            .field("symbol", &self.symbol)
            .finish()
    }
}

/// EVM chain configuration (wrapped-token contract + bridge signer key).
#[derive(Clone)]
pub struct EvmConfig {
    pub rpc_url: String,
    #[allow(dead_code)]
    pub rpc_fallback_urls: Vec<String>,
    pub chain_id: u64,
    pub wtkn_address: String,
    pub private_key: String,
    pub finality_blocks: u64,
}

impl fmt::Debug for EvmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmConfig")
            .field("rpc_url", &self.rpc_url)
            .field("rpc_fallback_urls", &self.rpc_fallback_urls)
            .field("chain_id", &self.chain_id)
            .field("wtkn_address", &self.wtkn_address)
            .field("private_key", &"<redacted>")
            .field("finality_blocks", &self.finality_blocks)
            .finish()
    }
}

impl EvmConfig {
    /// All RPC URLs: primary followed by fallbacks.
    pub fn all_rpc_urls(&self) -> Vec<String> {
        let mut urls = vec![self.rpc_url.clone()];
        urls.extend(self.rpc_fallback_urls.iter().cloned());
        urls
    }
}

/// Fee / blacklist-oracle configuration.
#[derive(Debug, Clone)]
pub struct FeeConfig {
    pub blacklist_url: Option<String>,
}

/// HTTP API server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

fn default_finality_blocks() -> u64 {
    5
}

fn default_hot_minimum() -> u64 {
    0
}

fn default_hot_cold_ratio() -> f64 {
    0.2
}

fn default_port() -> u16 {
    3050
}

impl Config {
    /// Load configuration from environment variables, loading a `.env` file first if present.
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::load_from_env())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    fn load_from_env() -> Result<Self> {
        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| eyre!("DATABASE_URL environment variable is required"))?,
        };

        let l1 = L1Config {
            ws_url: env::var("L1_WS_URL")
                .map_err(|_| eyre!("L1_WS_URL environment variable is required"))?,
            rpc_url: env::var("L1_RPC_URL")
                .map_err(|_| eyre!("L1_RPC_URL environment variable is required"))?,
            hot_wallet: env::var("L1_HOT_WALLET")
                .map_err(|_| eyre!("L1_HOT_WALLET environment variable is required"))?,
            cold_wallet: env::var("L1_COLD_WALLET")
                .map_err(|_| eyre!("L1_COLD_WALLET environment variable is required"))?,
            hot_wallet_key: env::var("L1_HOT_WALLET_KEY")
                .map_err(|_| eyre!("L1_HOT_WALLET_KEY environment variable is required"))?,
            hot_minimum: env::var("L1_HOT_MINIMUM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_hot_minimum()),
            hot_cold_ratio: env::var("L1_HOT_COLD_RATIO")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_hot_cold_ratio()),
            symbol: env::var("L1_SYMBOL").unwrap_or_else(|_| "PAW".to_string()),
        };

        let evm_rpc_raw = env::var("EVM_RPC_URL")
            .map_err(|_| eyre!("EVM_RPC_URL environment variable is required"))?;
        let evm_rpc_urls = crate::rpc_fallback::parse_rpc_urls(&evm_rpc_raw);
        if evm_rpc_urls.is_empty() {
            return Err(eyre!("EVM_RPC_URL cannot be empty"));
        }

        let evm = EvmConfig {
            rpc_url: evm_rpc_urls[0].clone(),
            rpc_fallback_urls: evm_rpc_urls[1..].to_vec(),
            chain_id: env::var("EVM_CHAIN_ID")
                .map_err(|_| eyre!("EVM_CHAIN_ID environment variable is required"))?
                .parse()
                .wrap_err("EVM_CHAIN_ID must be a valid u64")?,
            wtkn_address: env::var("EVM_WTKN_ADDRESS")
                .map_err(|_| eyre!("EVM_WTKN_ADDRESS environment variable is required"))?,
            private_key: env::var("EVM_PRIVATE_KEY")
                .map_err(|_| eyre!("EVM_PRIVATE_KEY environment variable is required"))?,
            finality_blocks: env::var("FINALITY_BLOCKS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_finality_blocks()),
        };

        let fees = FeeConfig {
            blacklist_url: env::var("BLACKLIST_URL").ok(),
        };

        let server = ServerConfig {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_port()),
        };

        let config = Config {
            database,
            l1,
            evm,
            fees,
            server,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(eyre!("database.url cannot be empty"));
        }

        if self.l1.ws_url.is_empty() {
            return Err(eyre!("l1.ws_url cannot be empty"));
        }
        if !self.l1.hot_wallet.starts_with("paw_") {
            return Err(eyre!("l1.hot_wallet must be a paw_ address"));
        }
        if !self.l1.cold_wallet.starts_with("paw_") {
            return Err(eyre!("l1.cold_wallet must be a paw_ address"));
        }
        if !(0.0..=1.0).contains(&self.l1.hot_cold_ratio) {
            return Err(eyre!("l1.hot_cold_ratio must be between 0.0 and 1.0"));
        }

        if self.evm.rpc_url.is_empty() {
            return Err(eyre!("evm.rpc_url cannot be empty"));
        }
        if self.evm.wtkn_address.len() != 42 || !self.evm.wtkn_address.starts_with("0x") {
            return Err(eyre!(
                "evm.wtkn_address must be a valid hex address (42 chars with 0x prefix)"
            ));
        }
        if self.evm.private_key.len() != 66 || !self.evm.private_key.starts_with("0x") {
            return Err(eyre!(
                "evm.private_key must be 66 chars (0x + 64 hex chars)"
            ));
        }

        if self.server.port == 0 {
            return Err(eyre!("server.port cannot be 0"));
        }

        Ok(())
    }
}
