//! Bridge state machine: claim, deposit, withdraw, and bidirectional swap (§4.5).
//!
//! `BridgeService` depends only on capability traits (§9's "duck-typed dependencies"),
//! so its operations are unit-testable against in-memory doubles without a database,
//! chain node, or real cryptography.

pub mod error;
pub mod handlers;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::db::{LedgerStore, SwapToNativeEvent};
use crate::hash::mint_receipt_digest;
use crate::queue::{PendingWithdrawal, Queue};
use crate::rebalance;
use crate::types::{AtomicUnits, EvmAddress};
use error::BridgeError;

pub const NATIVE_DECIMALS: u32 = 9;
pub const WRAPPED_DECIMALS: u32 = 18;

/// One L1 confirmation observed by the websocket stream or the sweep (§4.3).
#[derive(Debug, Clone)]
pub struct L1Confirmation {
    pub sender: String,
    pub receiver: String,
    pub raw_amount: u128,
    pub hash: String,
}

/// An entry in the blacklist oracle's list (§4.7).
#[derive(Debug, Clone)]
pub struct BlacklistEntry {
    pub address: String,
    pub alias: String,
    pub entry_type: String,
}

/// Connectivity to the native-coin ledger's node, delegating custody operations to
/// whatever signing the node-side wallet requires (§4.3.1).
#[async_trait]
pub trait L1Client: Send + Sync {
    fn subscribe_confirmations(&self) -> BoxStream<'static, L1Confirmation>;
    async fn list_pending_receivables(&self) -> eyre::Result<Vec<L1Confirmation>>;
    async fn receive(&self, hash: &str) -> eyre::Result<()>;
    async fn send(&self, to: &str, amount: AtomicUnits) -> eyre::Result<String>;
    async fn hot_balance(&self) -> eyre::Result<AtomicUnits>;
    async fn cold_balance(&self) -> eyre::Result<AtomicUnits>;
    async fn transfer_hot_to_cold(&self, amount: AtomicUnits) -> eyre::Result<String>;
}

/// Connectivity to the wrapped-token contract (§4.4.1).
#[async_trait]
pub trait EvmClient: Send + Sync {
    async fn balance_of(&self, evm: &EvmAddress) -> eyre::Result<AtomicUnits>;
    async fn sign_mint_receipt(&self, digest: [u8; 32]) -> eyre::Result<Vec<u8>>;
    fn chain_id(&self) -> u64;
}

#[async_trait]
pub trait BlacklistOracle: Send + Sync {
    async fn is_blacklisted(&self, native: &str) -> Result<Option<BlacklistEntry>, BridgeError>;
}

/// EIP-191 `personal_sign` recovery, isolated behind a trait so tests can substitute a
/// verifier that always agrees or always disagrees without touching real cryptography.
pub trait SignatureVerifier: Send + Sync {
    fn recover(&self, message: &str, signature: &[u8]) -> Result<EvmAddress, BridgeError>;
}

pub struct Eip191Verifier;

impl SignatureVerifier for Eip191Verifier {
    fn recover(&self, message: &str, signature: &[u8]) -> Result<EvmAddress, BridgeError> {
        let sig = alloy::primitives::Signature::try_from(signature)
            .map_err(|_| BridgeError::InvalidSignature)?;
        let address = sig
            .recover_address_from_msg(message)
            .map_err(|_| BridgeError::InvalidSignature)?;
        Ok(EvmAddress::from_alloy(address))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Ok,
    AlreadyDone,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DepositOutcome {
    Credited,
    Refunded { reason: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawOutcome {
    Completed { hash: String },
    Pending,
}

#[derive(Debug, Clone)]
pub struct SwapToWrappedOutcome {
    pub receipt: String,
    pub uuid: i64,
    pub wrapped_balance: AtomicUnits,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwapToNativeOutcome {
    Credited,
    Duplicate,
}

pub struct BridgeService {
    pub ledger: Arc<dyn LedgerStore>,
    pub queue: Arc<dyn Queue>,
    pub l1: Arc<dyn L1Client>,
    pub evm: Arc<dyn EvmClient>,
    pub blacklist: Arc<dyn BlacklistOracle>,
    pub verifier: Arc<dyn SignatureVerifier>,
    pub symbol: String,
    pub hot_minimum: AtomicUnits,
    pub hot_cold_ratio: f64,
}

impl BridgeService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        queue: Arc<dyn Queue>,
        l1: Arc<dyn L1Client>,
        evm: Arc<dyn EvmClient>,
        blacklist: Arc<dyn BlacklistOracle>,
        verifier: Arc<dyn SignatureVerifier>,
        symbol: String,
        hot_minimum: AtomicUnits,
        hot_cold_ratio: f64,
    ) -> Self {
        BridgeService {
            ledger,
            queue,
            l1,
            evm,
            blacklist,
            verifier,
            symbol,
            hot_minimum,
            hot_cold_ratio,
        }
    }

    fn claim_challenge(native: &str) -> String {
        format!("I hereby claim that the native address \"{}\" is mine", native)
    }

    fn withdraw_challenge(&self, amount: &str, native: &str) -> String {
        format!(
            "Withdraw {} {} to my wallet \"{}\"",
            amount, self.symbol, native
        )
    }

    fn swap_challenge(&self, amount: &str, native: &str) -> String {
        format!(
            "Swap {} {} for w{} with {} I deposited from my wallet \"{}\"",
            amount, self.symbol, self.symbol, self.symbol, native
        )
    }

    /// Bind a native address to an EVM address by signed challenge (§4.5 "Claim").
    pub async fn claim(
        &self,
        native: &str,
        evm: &EvmAddress,
        signature: &[u8],
    ) -> Result<ClaimOutcome, BridgeError> {
        let recovered = self
            .verifier
            .recover(&Self::claim_challenge(native), signature)?;
        if recovered != *evm {
            return Err(BridgeError::InvalidSignature);
        }

        if self.blacklist.is_blacklisted(native).await?.is_some() {
            return Err(BridgeError::Blacklisted);
        }

        if self.ledger.has_claim(native, &evm.as_hex()).await? {
            return Ok(ClaimOutcome::AlreadyDone);
        }

        if self.ledger.has_pending_claim(native).await? {
            return Err(BridgeError::InvalidOwner);
        }

        self.ledger.store_pending_claim(native, &evm.as_hex()).await?;
        Ok(ClaimOutcome::Ok)
    }

    /// Process one deposit job (§4.5 "Deposit").
    pub async fn deposit(
        &self,
        sender: &str,
        raw_amount: u128,
        ts: i64,
        hash: &str,
    ) -> Result<DepositOutcome, BridgeError> {
        if self.ledger.has_pending_claim(sender).await? {
            self.ledger.confirm_claim(sender).await?;
        }

        self.l1
            .receive(hash)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;

        if self.ledger.has_deposit(sender, hash).await? {
            return Ok(DepositOutcome::Credited);
        }

        let amount = AtomicUnits(alloy::primitives::U256::from(raw_amount));

        if !self.ledger.is_claimed(sender).await? {
            self.refund(sender, amount).await?;
            return Ok(DepositOutcome::Refunded { reason: "unclaimed" });
        }

        if amount.has_more_than_two_decimals(NATIVE_DECIMALS) {
            self.refund(sender, amount).await?;
            return Ok(DepositOutcome::Refunded {
                reason: "too_many_decimals",
            });
        }

        self.ledger.store_deposit(sender, amount, ts, hash).await?;
        rebalance::maybe_rebalance(
            self.l1.as_ref(),
            amount,
            self.hot_minimum,
            self.hot_cold_ratio,
        )
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(DepositOutcome::Credited)
    }

    async fn refund(&self, sender: &str, amount: AtomicUnits) -> Result<(), BridgeError> {
        self.l1
            .send(sender, amount)
            .await
            .map(|_| ())
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))
    }

    /// Process one withdrawal request (§4.5 "Withdrawal"). `signature` is `None` for
    /// delayed-retry replays, since the first attempt already verified it.
    pub async fn withdraw(
        &self,
        native: &str,
        amount_str: &str,
        evm: &EvmAddress,
        signature: Option<&[u8]>,
        ts: i64,
        attempt: u32,
    ) -> Result<WithdrawOutcome, BridgeError> {
        if self.ledger.has_withdrawal_at(native, ts).await? {
            return Err(BridgeError::AlreadyProcessed);
        }

        if let Some(signature) = signature {
            let recovered = self
                .verifier
                .recover(&self.withdraw_challenge(amount_str, native), signature)?;
            if recovered != *evm {
                return Err(BridgeError::InvalidSignature);
            }
        }

        if !self.ledger.is_claimed(native).await? || !self.ledger.has_claim(native, &evm.as_hex()).await? {
            return Err(BridgeError::InvalidOwner);
        }

        let amount = AtomicUnits::parse_decimal(amount_str, NATIVE_DECIMALS)
            .map_err(|_| BridgeError::InsufficientBalance)?;

        let balance = self.ledger.get_balance(native).await?;
        if balance < amount {
            return Err(BridgeError::InsufficientBalance);
        }

        let hot_balance = self
            .l1
            .hot_balance()
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        if hot_balance < amount {
            self.queue
                .enqueue_pending_withdrawal(&PendingWithdrawal {
                    native: native.to_string(),
                    evm: evm.as_hex(),
                    amount,
                    ts,
                    attempt,
                })
                .await?;
            return Ok(WithdrawOutcome::Pending);
        }

        let hash = self
            .l1
            .send(native, amount)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        self.ledger.store_withdrawal(native, amount, ts, &hash).await?;
        Ok(WithdrawOutcome::Completed { hash })
    }

    /// Convert native balance into a signed mint receipt for `wTKN` (§4.5 "Swap native → wrapped").
    pub async fn swap_to_wrapped(
        &self,
        native: &str,
        amount_str: &str,
        evm: &EvmAddress,
        ts: i64,
        signature: &[u8],
    ) -> Result<SwapToWrappedOutcome, BridgeError> {
        let recovered = self
            .verifier
            .recover(&self.swap_challenge(amount_str, native), signature)?;
        if recovered != *evm {
            return Err(BridgeError::InvalidSignature);
        }

        if !self.ledger.has_claim(native, &evm.as_hex()).await? {
            return Err(BridgeError::InvalidOwner);
        }

        let amount = AtomicUnits::parse_decimal(amount_str, NATIVE_DECIMALS)
            .map_err(|_| BridgeError::InsufficientBalance)?;

        let balance = self.ledger.get_balance(native).await?;
        if balance < amount {
            return Err(BridgeError::InsufficientBalance);
        }

        let uuid = Utc::now().timestamp_millis();
        let wrapped_amount = AtomicUnits(amount.0 * alloy::primitives::U256::from(10u64).pow(
            alloy::primitives::U256::from(WRAPPED_DECIMALS - NATIVE_DECIMALS),
        ));
        let digest = mint_receipt_digest(evm.as_alloy(), wrapped_amount.0, uuid as u64, self.evm.chain_id());
        let signature_bytes = self
            .evm
            .sign_mint_receipt(digest.into())
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        let receipt = format!("0x{}", hex::encode(&signature_bytes));

        self.ledger
            .store_swap_to_wrapped(native, &evm.as_hex(), amount, ts, &receipt, uuid)
            .await?;

        let wrapped_balance = self
            .evm
            .balance_of(evm)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;

        Ok(SwapToWrappedOutcome {
            receipt,
            uuid,
            wrapped_balance,
        })
    }

    /// Credit a confirmed `wTKN` burn event to the owning native balance (§4.5 "Swap wrapped → native").
    pub async fn swap_to_native(
        &self,
        evm: &str,
        native: &str,
        amount: AtomicUnits,
        ts: i64,
        hash: &str,
    ) -> Result<SwapToNativeOutcome, BridgeError> {
        if self.ledger.has_swap_to_native(evm, hash).await? {
            return Ok(SwapToNativeOutcome::Duplicate);
        }
        self.ledger
            .store_swap_to_native(&SwapToNativeEvent {
                evm: evm.to_string(),
                native: native.to_string(),
                amount,
                ts,
                hash: hash.to_string(),
            })
            .await?;
        Ok(SwapToNativeOutcome::Credited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct InMemoryLedger {
        balances: Mutex<HashMap<String, AtomicUnits>>,
        pending_claims: Mutex<HashMap<String, String>>,
        confirmed_claims: Mutex<HashMap<String, String>>,
        deposits: Mutex<Vec<(String, String)>>,
        withdrawals: Mutex<Vec<(String, i64)>>,
        swaps_to_native: Mutex<Vec<(String, String)>>,
        pending_claim_calls: Mutex<u32>,
    }

    impl InMemoryLedger {
        fn new() -> Self {
            InMemoryLedger {
                balances: Mutex::new(HashMap::new()),
                pending_claims: Mutex::new(HashMap::new()),
                confirmed_claims: Mutex::new(HashMap::new()),
                deposits: Mutex::new(Vec::new()),
                withdrawals: Mutex::new(Vec::new()),
                swaps_to_native: Mutex::new(Vec::new()),
                pending_claim_calls: Mutex::new(0),
            }
        }

        fn with_balance(self, native: &str, amount: AtomicUnits) -> Self {
            self.balances.lock().unwrap().insert(native.to_string(), amount);
            self
        }

        fn with_confirmed_claim(self, native: &str, evm: &str) -> Self {
            self.confirmed_claims
                .lock()
                .unwrap()
                .insert(native.to_string(), evm.to_string());
            self
        }
    }

    #[async_trait]
    impl LedgerStore for InMemoryLedger {
        async fn get_balance(&self, native: &str) -> Result<AtomicUnits, BridgeError> {
            Ok(*self.balances.lock().unwrap().get(native).unwrap_or(&AtomicUnits::ZERO))
        }
        async fn has_pending_claim(&self, native: &str) -> Result<bool, BridgeError> {
            Ok(self.pending_claims.lock().unwrap().contains_key(native))
        }
        async fn store_pending_claim(&self, native: &str, evm: &str) -> Result<bool, BridgeError> {
            *self.pending_claim_calls.lock().unwrap() += 1;
            let mut map = self.pending_claims.lock().unwrap();
            if map.contains_key(native) {
                return Ok(false);
            }
            map.insert(native.to_string(), evm.to_string());
            Ok(true)
        }
        async fn is_claimed(&self, native: &str) -> Result<bool, BridgeError> {
            Ok(self.confirmed_claims.lock().unwrap().contains_key(native))
        }
        async fn has_claim(&self, native: &str, evm: &str) -> Result<bool, BridgeError> {
            Ok(self.confirmed_claims.lock().unwrap().get(native).map(String::as_str) == Some(evm))
        }
        async fn confirm_claim(&self, native: &str) -> Result<bool, BridgeError> {
            let evm = self.pending_claims.lock().unwrap().remove(native);
            match evm {
                Some(evm) => {
                    self.confirmed_claims.lock().unwrap().insert(native.to_string(), evm);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        async fn has_deposit(&self, native: &str, hash: &str) -> Result<bool, BridgeError> {
            Ok(self
                .deposits
                .lock()
                .unwrap()
                .iter()
                .any(|(n, h)| n == native && h == hash))
        }
        async fn store_deposit(
            &self,
            native: &str,
            amount: AtomicUnits,
            _ts: i64,
            hash: &str,
        ) -> Result<(), BridgeError> {
            self.deposits.lock().unwrap().push((native.to_string(), hash.to_string()));
            let mut balances = self.balances.lock().unwrap();
            let entry = balances.entry(native.to_string()).or_insert(AtomicUnits::ZERO);
            *entry = entry.saturating_add(amount);
            Ok(())
        }
        async fn has_withdrawal_at(&self, native: &str, ts: i64) -> Result<bool, BridgeError> {
            Ok(self.withdrawals.lock().unwrap().iter().any(|(n, t)| n == native && *t == ts))
        }
        async fn store_withdrawal(
            &self,
            native: &str,
            amount: AtomicUnits,
            ts: i64,
            _hash: &str,
        ) -> Result<(), BridgeError> {
            self.withdrawals.lock().unwrap().push((native.to_string(), ts));
            let mut balances = self.balances.lock().unwrap();
            let entry = balances.entry(native.to_string()).or_insert(AtomicUnits::ZERO);
            *entry = entry.checked_sub(amount).unwrap();
            Ok(())
        }
        async fn store_swap_to_wrapped(
            &self,
            native: &str,
            _evm: &str,
            amount: AtomicUnits,
            _ts: i64,
            _receipt: &str,
            _uuid: i64,
        ) -> Result<(), BridgeError> {
            let mut balances = self.balances.lock().unwrap();
            let entry = balances.entry(native.to_string()).or_insert(AtomicUnits::ZERO);
            *entry = entry.checked_sub(amount).unwrap();
            Ok(())
        }
        async fn has_swap_to_native(&self, evm: &str, hash: &str) -> Result<bool, BridgeError> {
            Ok(self
                .swaps_to_native
                .lock()
                .unwrap()
                .iter()
                .any(|(e, h)| e == evm && h == hash))
        }
        async fn store_swap_to_native(&self, swap: &SwapToNativeEvent) -> Result<(), BridgeError> {
            self.swaps_to_native
                .lock()
                .unwrap()
                .push((swap.evm.clone(), swap.hash.clone()));
            let mut balances = self.balances.lock().unwrap();
            let entry = balances.entry(swap.native.clone()).or_insert(AtomicUnits::ZERO);
            *entry = entry.saturating_add(swap.amount);
            Ok(())
        }
        async fn get_scan_cursor(&self) -> Result<i64, BridgeError> {
            Ok(0)
        }
        async fn advance_scan_cursor(&self, _block: i64) -> Result<(), BridgeError> {
            Ok(())
        }
        async fn history(&self, _evm: &str, _native: &str) -> Result<crate::db::History, BridgeError> {
            Ok(crate::db::History::default())
        }
    }

    struct DummyL1 {
        hot: Mutex<AtomicUnits>,
        sends: Mutex<u32>,
    }

    impl DummyL1 {
        fn new(hot: u64) -> Self {
            DummyL1 {
                hot: Mutex::new(AtomicUnits::from_u64(hot)),
                sends: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl L1Client for DummyL1 {
        fn subscribe_confirmations(&self) -> BoxStream<'static, L1Confirmation> {
            Box::pin(futures::stream::empty())
        }
        async fn list_pending_receivables(&self) -> eyre::Result<Vec<L1Confirmation>> {
            Ok(vec![])
        }
        async fn receive(&self, _hash: &str) -> eyre::Result<()> {
            Ok(())
        }
        async fn send(&self, _to: &str, _amount: AtomicUnits) -> eyre::Result<String> {
            *self.sends.lock().unwrap() += 1;
            Ok("0xsendhash".to_string())
        }
        async fn hot_balance(&self) -> eyre::Result<AtomicUnits> {
            Ok(*self.hot.lock().unwrap())
        }
        async fn cold_balance(&self) -> eyre::Result<AtomicUnits> {
            Ok(AtomicUnits::ZERO)
        }
        async fn transfer_hot_to_cold(&self, _amount: AtomicUnits) -> eyre::Result<String> {
            Ok("0xrebalance".to_string())
        }
    }

    struct DummyEvm;

    #[async_trait]
    impl EvmClient for DummyEvm {
        async fn balance_of(&self, _evm: &EvmAddress) -> eyre::Result<AtomicUnits> {
            Ok(AtomicUnits::ZERO)
        }
        async fn sign_mint_receipt(&self, _digest: [u8; 32]) -> eyre::Result<Vec<u8>> {
            Ok(vec![0u8; 65])
        }
        fn chain_id(&self) -> u64 {
            1
        }
    }

    struct NeverBlacklisted;

    #[async_trait]
    impl BlacklistOracle for NeverBlacklisted {
        async fn is_blacklisted(&self, _native: &str) -> Result<Option<BlacklistEntry>, BridgeError> {
            Ok(None)
        }
    }

    struct AlwaysBlacklisted;

    #[async_trait]
    impl BlacklistOracle for AlwaysBlacklisted {
        async fn is_blacklisted(&self, native: &str) -> Result<Option<BlacklistEntry>, BridgeError> {
            Ok(Some(BlacklistEntry {
                address: native.to_string(),
                alias: "flagged".to_string(),
                entry_type: "sanctions".to_string(),
            }))
        }
    }

    /// Treats the raw 20-byte "signature" as the recovered address directly, letting
    /// tests exercise the state machine without real ECDSA recovery.
    struct AlwaysVerifies;

    impl SignatureVerifier for AlwaysVerifies {
        fn recover(&self, _message: &str, signature: &[u8]) -> Result<EvmAddress, BridgeError> {
            if signature.len() != 20 {
                return Err(BridgeError::InvalidSignature);
            }
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(signature);
            Ok(EvmAddress(bytes))
        }
    }

    struct NullQueue {
        enqueued: Mutex<Vec<PendingWithdrawal>>,
    }

    impl NullQueue {
        fn new() -> Self {
            NullQueue { enqueued: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl Queue for NullQueue {
        async fn enqueue(
            &self,
            _topic: &str,
            _id: &str,
            _payload: serde_json::Value,
            _delay: std::time::Duration,
            _max_attempts: i32,
        ) -> Result<(), BridgeError> {
            Ok(())
        }
        async fn enqueue_pending_withdrawal(&self, w: &PendingWithdrawal) -> Result<(), BridgeError> {
            self.enqueued.lock().unwrap().push(w.clone());
            Ok(())
        }
        async fn get_pending_withdrawals_amount(&self) -> Result<AtomicUnits, BridgeError> {
            Ok(AtomicUnits::ZERO)
        }
        async fn register_processor(&self, _topic: &'static str, _handler: Arc<dyn crate::queue::JobHandler>) {}
        fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<crate::queue::JobEvent> {
            tokio::sync::broadcast::channel(1).1
        }
        async fn run(self: Arc<Self>, _shutdown: tokio::sync::watch::Receiver<bool>) -> eyre::Result<()> {
            Ok(())
        }
    }

    fn test_evm() -> EvmAddress {
        EvmAddress::from_hex("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
    }

    fn service(ledger: InMemoryLedger, hot: u64, blacklisted: bool) -> BridgeService {
        let blacklist: Arc<dyn BlacklistOracle> = if blacklisted {
            Arc::new(AlwaysBlacklisted)
        } else {
            Arc::new(NeverBlacklisted)
        };
        BridgeService::new(
            Arc::new(ledger),
            Arc::new(NullQueue::new()),
            Arc::new(DummyL1::new(hot)),
            Arc::new(DummyEvm),
            blacklist,
            Arc::new(AlwaysVerifies),
            "PAW".to_string(),
            AtomicUnits::ZERO,
            0.2,
        )
    }

    #[tokio::test]
    async fn test_claim_then_duplicate_claim_is_already_done() {
        let svc = service(InMemoryLedger::new(), 1000, false);
        let evm = test_evm();
        let outcome = svc.claim("paw_x", &evm, &evm.0).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::Ok);
        svc.ledger.confirm_claim("paw_x").await.unwrap();
        let second = svc.claim("paw_x", &evm, &evm.0).await.unwrap();
        assert_eq!(second, ClaimOutcome::AlreadyDone);
    }

    #[tokio::test]
    async fn test_claim_collision_returns_invalid_owner() {
        let svc = service(InMemoryLedger::new(), 1000, false);
        let evm_a = test_evm();
        let evm_b = EvmAddress::from_hex("0x000000000000000000000000000000000000000b").unwrap();
        svc.claim("paw_x", &evm_a, &evm_a.0).await.unwrap();
        let result = svc.claim("paw_x", &evm_b, &evm_b.0).await;
        assert_eq!(result, Err(BridgeError::InvalidOwner));
    }

    #[tokio::test]
    async fn test_claim_blacklisted_native_is_rejected() {
        let svc = service(InMemoryLedger::new(), 1000, true);
        let evm = test_evm();
        let result = svc.claim("paw_blocked", &evm, &evm.0).await;
        assert_eq!(result, Err(BridgeError::Blacklisted));
    }

    #[tokio::test]
    async fn test_negative_withdrawal_rejected() {
        let ledger = InMemoryLedger::new()
            .with_balance("paw_x", AtomicUnits::from_u64(200_000_000_000))
            .with_confirmed_claim("paw_x", &test_evm().as_hex());
        let svc = service(ledger, 100_000_000_000, false);
        let result = svc
            .withdraw("paw_x", "-5", &test_evm(), None, 1, 0)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_insufficient_hot_liquidity_enqueues_pending() {
        let ledger = InMemoryLedger::new()
            .with_balance("paw_x", AtomicUnits::parse_decimal("200", NATIVE_DECIMALS).unwrap())
            .with_confirmed_claim("paw_x", &test_evm().as_hex());
        let svc = service(ledger, 100_000_000_000, false);
        let outcome = svc
            .withdraw("paw_x", "150", &test_evm(), None, 1, 0)
            .await
            .unwrap();
        assert_eq!(outcome, WithdrawOutcome::Pending);
    }

    #[tokio::test]
    async fn test_idempotent_withdrawal_rejected_on_replay() {
        let ledger = InMemoryLedger::new()
            .with_balance("paw_x", AtomicUnits::parse_decimal("200", NATIVE_DECIMALS).unwrap())
            .with_confirmed_claim("paw_x", &test_evm().as_hex());
        let svc = service(ledger, 300_000_000_000, false);
        let first = svc
            .withdraw("paw_x", "100", &test_evm(), None, 42, 0)
            .await
            .unwrap();
        assert!(matches!(first, WithdrawOutcome::Completed { .. }));
        let second = svc.withdraw("paw_x", "100", &test_evm(), None, 42, 0).await;
        assert_eq!(second, Err(BridgeError::AlreadyProcessed));
    }

    #[tokio::test]
    async fn test_deposit_to_unclaimed_wallet_refunds() {
        let svc = service(InMemoryLedger::new(), 1000, false);
        let outcome = svc
            .deposit("paw_s", 1_000_000_000, 1, "hash1")
            .await
            .unwrap();
        assert_eq!(outcome, DepositOutcome::Refunded { reason: "unclaimed" });
        assert!(!svc.ledger.has_deposit("paw_s", "hash1").await.unwrap());
    }

    #[tokio::test]
    async fn test_deposit_with_more_than_two_decimals_refunds() {
        let ledger = InMemoryLedger::new().with_confirmed_claim("paw_s", &test_evm().as_hex());
        let svc = service(ledger, 1000, false);
        let raw = AtomicUnits::parse_decimal("1.466", NATIVE_DECIMALS).unwrap();
        let outcome = svc
            .deposit("paw_s", raw.0.try_into().unwrap(), 1, "hash2")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DepositOutcome::Refunded {
                reason: "too_many_decimals"
            }
        );
    }

    #[tokio::test]
    async fn test_swap_without_claim_returns_invalid_owner() {
        let ledger = InMemoryLedger::new()
            .with_balance("paw_x", AtomicUnits::parse_decimal("200", NATIVE_DECIMALS).unwrap())
            .with_confirmed_claim("paw_x", "0x000000000000000000000000000000000000aa");
        let svc = service(ledger, 1000, false);
        let evm = test_evm();
        let result = svc
            .swap_to_wrapped("paw_x", "10", &evm, 1, &evm.0)
            .await;
        assert!(matches!(result, Err(BridgeError::InvalidOwner)));
    }

    #[tokio::test]
    async fn test_swap_to_native_duplicate_is_noop() {
        let svc = service(InMemoryLedger::new(), 1000, false);
        let amount = AtomicUnits::from_u64(500);
        let first = svc
            .swap_to_native("0xevm", "paw_x", amount, 1, "burnhash")
            .await
            .unwrap();
        assert_eq!(first, SwapToNativeOutcome::Credited);
        let second = svc
            .swap_to_native("0xevm", "paw_x", amount, 1, "burnhash")
            .await
            .unwrap();
        assert_eq!(second, SwapToNativeOutcome::Duplicate);
        assert_eq!(svc.ledger.get_balance("paw_x").await.unwrap(), amount);
    }
}
