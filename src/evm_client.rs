//! Concrete `EvmClient` (§4.5.1, §9): reads `wTKN` balances and signs mint receipts
//! with the bridge's EVM key.
//!
//! Same `ProviderBuilder`/`EthereumWallet`/`PrivateKeySigner` construction and
//! `sol!`-generated contract handle pattern as the rest of this crate's EVM-facing
//! code, used here for a read-only `balanceOf` call and an off-chain `personal_sign`
//! over a receipt digest rather than an on-chain transaction.

use alloy::primitives::Address;
use alloy::providers::RootProvider;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use alloy::transports::http::{Client as HttpClient, Http};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::str::FromStr;
use tracing::info;

use crate::bridge::EvmClient;
use crate::config::EvmConfig;
use crate::contracts::evm_bridge::WrappedToken;
use crate::rpc_fallback;
use crate::types::{AtomicUnits, EvmAddress};

pub struct AlloyEvmClient {
    providers: Vec<RootProvider<Http<HttpClient>>>,
    wtkn_address: Address,
    chain_id: u64,
    signer: PrivateKeySigner,
}

impl AlloyEvmClient {
    pub fn new(config: &EvmConfig) -> Result<Self> {
        let providers = rpc_fallback::create_providers(&config.all_rpc_urls())?;
        let wtkn_address = Address::from_str(&config.wtkn_address)
            .map_err(|e| eyre!("Invalid wTKN address: {}", e))?;
        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .map_err(|e| eyre!("Invalid EVM private key: {}", e))?;

        info!(
            signer = %signer.address(),
            wtkn = %wtkn_address,
            chain_id = config.chain_id,
            "EVM client initialized"
        );

        Ok(AlloyEvmClient {
            providers,
            wtkn_address,
            chain_id: config.chain_id,
            signer,
        })
    }
}

#[async_trait]
impl EvmClient for AlloyEvmClient {
    async fn balance_of(&self, evm: &EvmAddress) -> Result<AtomicUnits> {
        let account = Address::from(evm.0);
        let mut last_error = None;

        for provider in &self.providers {
            let contract = WrappedToken::new(self.wtkn_address, provider);
            match contract.balanceOf(account).call().await {
                Ok(balance) => return Ok(AtomicUnits(balance._0)),
                Err(e) => last_error = Some(eyre!("Failed to query balanceOf: {}", e)),
            }
        }

        Err(last_error.unwrap_or_else(|| eyre!("no RPC providers configured")))
    }

    async fn sign_mint_receipt(&self, digest: [u8; 32]) -> Result<Vec<u8>> {
        let signature = self
            .signer
            .sign_message(&digest)
            .await
            .map_err(|e| eyre!("Failed to sign mint receipt: {}", e))?;
        Ok(signature.as_bytes().to_vec())
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}
