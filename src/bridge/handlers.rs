//! Job handlers binding queued payloads (§4.2) to `BridgeService` operations.
//!
//! One `JobHandler` per topic: `deposit` (L1 Watcher), `swap-to-native` (EVM
//! Watcher), `withdrawal` (HTTP-submitted first attempt, and every delayed
//! retry enqueued by the pending-withdrawal sweep), and `swap-to-wrapped`
//! (HTTP-submitted). `claim` has no handler here — it is the one HTTP route
//! the API layer still calls synchronously, since it has no retry/pending
//! path to indirect through the queue.

use async_trait::async_trait;
use std::sync::Arc;

use super::{BridgeService, WithdrawOutcome};
use crate::metrics;
use crate::queue::JobHandler;
use crate::types::{AtomicUnits, EvmAddress};

fn field<'a>(payload: &'a serde_json::Value, name: &str) -> eyre::Result<&'a str> {
    payload
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| eyre::eyre!("job payload missing field {}", name))
}

fn i64_field(payload: &serde_json::Value, name: &str) -> eyre::Result<i64> {
    payload
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| eyre::eyre!("job payload missing field {}", name))
}

fn decode_sig_hex(sig: &str) -> eyre::Result<Vec<u8>> {
    let sig = sig.strip_prefix("0x").unwrap_or(sig);
    hex::decode(sig).map_err(|e| eyre::eyre!("invalid signature hex: {}", e))
}

pub struct DepositJobHandler {
    pub bridge: Arc<BridgeService>,
}

#[async_trait]
impl JobHandler for DepositJobHandler {
    async fn handle(&self, payload: serde_json::Value) -> eyre::Result<()> {
        let sender = field(&payload, "sender")?;
        let amount: u128 = field(&payload, "amount")?
            .parse()
            .map_err(|_| eyre::eyre!("invalid amount in deposit job"))?;
        let ts = i64_field(&payload, "ts")?;
        let hash = field(&payload, "hash")?;

        self.bridge
            .deposit(sender, amount, ts, hash)
            .await?;
        Ok(())
    }
}

pub struct SwapToNativeJobHandler {
    pub bridge: Arc<BridgeService>,
}

#[async_trait]
impl JobHandler for SwapToNativeJobHandler {
    async fn handle(&self, payload: serde_json::Value) -> eyre::Result<()> {
        let evm = field(&payload, "evm")?;
        let native = field(&payload, "native")?;
        let amount_raw: alloy::primitives::U256 = field(&payload, "amount")?
            .parse()
            .map_err(|_| eyre::eyre!("invalid amount in swap-to-native job"))?;
        let ts = i64_field(&payload, "ts")?;
        let hash = field(&payload, "hash")?;

        self.bridge
            .swap_to_native(evm, native, AtomicUnits(amount_raw), ts, hash)
            .await?;
        Ok(())
    }
}

pub struct WithdrawalJobHandler {
    pub bridge: Arc<BridgeService>,
}

#[async_trait]
impl JobHandler for WithdrawalJobHandler {
    async fn handle(&self, payload: serde_json::Value) -> eyre::Result<()> {
        let native = field(&payload, "native")?;
        let evm_hex = field(&payload, "evm")?;
        let evm = EvmAddress::from_hex(evm_hex)?;
        let amount_str = field(&payload, "amount")?;
        let ts = i64_field(&payload, "ts")?;
        let attempt = payload
            .get("attempt")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;

        // The first attempt (enqueued from the HTTP handler) carries the
        // caller's signature for verification. Delayed retries, enqueued by
        // the pending-withdrawal sweep, omit it: the first attempt already
        // verified ownership.
        let sig_bytes;
        let signature = match payload.get("sig").and_then(|v| v.as_str()) {
            Some(sig_hex) => {
                sig_bytes = decode_sig_hex(sig_hex)?;
                Some(sig_bytes.as_slice())
            }
            None => None,
        };

        let result = self
            .bridge
            .withdraw(native, amount_str, &evm, signature, ts, attempt)
            .await;
        match &result {
            Ok(WithdrawOutcome::Completed { .. }) => metrics::record_withdrawal("completed"),
            Ok(WithdrawOutcome::Pending) => metrics::record_withdrawal("pending"),
            Err(e) => metrics::record_withdrawal(e.code()),
        }
        result?;
        Ok(())
    }
}

pub struct SwapToWrappedJobHandler {
    pub bridge: Arc<BridgeService>,
}

#[async_trait]
impl JobHandler for SwapToWrappedJobHandler {
    async fn handle(&self, payload: serde_json::Value) -> eyre::Result<()> {
        let native = field(&payload, "native")?;
        let evm_hex = field(&payload, "evm")?;
        let evm = EvmAddress::from_hex(evm_hex)?;
        let amount_str = field(&payload, "amount")?;
        let ts = i64_field(&payload, "ts")?;
        let signature = decode_sig_hex(field(&payload, "sig")?)?;

        let result = self
            .bridge
            .swap_to_wrapped(native, amount_str, &evm, ts, &signature)
            .await;
        match &result {
            Ok(_) => metrics::record_swap_to_wrapped("ok"),
            Err(e) => metrics::record_swap_to_wrapped(e.code()),
        }
        result?;
        Ok(())
    }
}
