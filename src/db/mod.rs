#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use eyre::{Result, WrapErr};
use rand::Rng;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use tracing::{error, warn};

pub mod models;

pub use models::*;

use crate::bridge::error::BridgeError;
use crate::types::AtomicUnits;

/// Create a database connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .wrap_err("Failed to connect to database")
}

/// Run pending migrations (uses the migration files in migrations/).
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .wrap_err("Failed to run database migrations")?;
    Ok(())
}

/// A record of a confirmed swap-to-native (burn on EVM, credited to the native balance);
/// handed off from the EVM Watcher to the Bridge Service (§4.5 "swap wrapped → native").
#[derive(Debug, Clone)]
pub struct SwapToNativeEvent {
    pub evm: String,
    pub native: String,
    pub amount: AtomicUnits,
    pub ts: i64,
    pub hash: String,
}

/// History response shape for `GET /history/:evm/:native` (§6).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct History {
    pub deposits: Vec<Deposit>,
    pub withdrawals: Vec<Withdrawal>,
    pub swaps_to_wrapped: Vec<SwapToWrapped>,
    pub swaps_to_native: Vec<SwapToNative>,
}

const HISTORY_LIMIT: i64 = 1000;
const LOCK_RETRY_ATTEMPTS: u32 = 10;
const LOCK_BASE_JITTER_MS: u64 = 200;

/// Capability interface for the Ledger Store (§4.1, §9 "capability interfaces"). The Bridge
/// Service depends only on this trait so tests can substitute an in-memory double.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_balance(&self, native: &str) -> Result<AtomicUnits, BridgeError>;

    async fn has_pending_claim(&self, native: &str) -> Result<bool, BridgeError>;
    async fn store_pending_claim(&self, native: &str, evm: &str) -> Result<bool, BridgeError>;
    async fn is_claimed(&self, native: &str) -> Result<bool, BridgeError>;
    async fn has_claim(&self, native: &str, evm: &str) -> Result<bool, BridgeError>;
    async fn confirm_claim(&self, native: &str) -> Result<bool, BridgeError>;

    async fn has_deposit(&self, native: &str, hash: &str) -> Result<bool, BridgeError>;
    async fn store_deposit(
        &self,
        native: &str,
        amount: AtomicUnits,
        ts: i64,
        hash: &str,
    ) -> Result<(), BridgeError>;

    async fn has_withdrawal_at(&self, native: &str, ts: i64) -> Result<bool, BridgeError>;
    async fn store_withdrawal(
        &self,
        native: &str,
        amount: AtomicUnits,
        ts: i64,
        hash: &str,
    ) -> Result<(), BridgeError>;

    async fn store_swap_to_wrapped(
        &self,
        native: &str,
        evm: &str,
        amount: AtomicUnits,
        ts: i64,
        receipt: &str,
        uuid: i64,
    ) -> Result<(), BridgeError>;

    async fn has_swap_to_native(&self, evm: &str, hash: &str) -> Result<bool, BridgeError>;
    async fn store_swap_to_native(&self, swap: &SwapToNativeEvent) -> Result<(), BridgeError>;

    async fn get_scan_cursor(&self) -> Result<i64, BridgeError>;
    async fn advance_scan_cursor(&self, block: i64) -> Result<(), BridgeError>;

    async fn history(&self, evm: &str, native: &str) -> Result<History, BridgeError>;
}

pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        PostgresLedgerStore { pool }
    }

    /// Acquire the named mutex `balance:<native>` (or `swap-to-wrapped:<native>`) per §4.1's
    /// algorithm: up to 10 attempts, 200ms +/- 200ms jitter, backed by a non-blocking
    /// `pg_try_advisory_xact_lock` so a crashed holder cannot wedge the retry loop (the lock
    /// is released automatically when the transaction holding it ends, which subsumes the
    /// 1s TTL §4.1 describes).
    async fn acquire_named_lock(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        name: &str,
    ) -> Result<(), BridgeError> {
        for attempt in 0..LOCK_RETRY_ATTEMPTS {
            let row = sqlx::query("SELECT pg_try_advisory_xact_lock(hashtext($1))")
                .bind(name)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
            let acquired: bool = row.get(0);
            if acquired {
                return Ok(());
            }
            if attempt + 1 == LOCK_RETRY_ATTEMPTS {
                break;
            }
            let jitter_ms = rand::thread_rng().gen_range(0..=LOCK_BASE_JITTER_MS);
            tokio::time::sleep(Duration::from_millis(LOCK_BASE_JITTER_MS / 2 + jitter_ms / 2))
                .await;
        }
        warn!(lock = name, "advisory lock acquisition exhausted");
        Err(BridgeError::ContentionTimeout)
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn get_balance(&self, native: &str) -> Result<AtomicUnits, BridgeError> {
        let row = sqlx::query("SELECT amount::TEXT as amount FROM balances WHERE native = $1")
            .bind(native)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        match row {
            Some(row) => {
                let amount: String = row.get("amount");
                Ok(AtomicUnits(amount.parse().unwrap_or_default()))
            }
            None => Ok(AtomicUnits::ZERO),
        }
    }

    async fn has_pending_claim(&self, native: &str) -> Result<bool, BridgeError> {
        let row = sqlx::query(
            "SELECT 1 FROM pending_claims WHERE native = $1 AND expires_at > now()",
        )
        .bind(native)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn store_pending_claim(&self, native: &str, evm: &str) -> Result<bool, BridgeError> {
        let expires_at = Utc::now() + ChronoDuration::seconds(300);
        // No-op if a (non-expired) pending claim already exists for this native address,
        // per §4.1's "StorePendingClaim" contract.
        let result = sqlx::query(
            r#"
            INSERT INTO pending_claims (native, evm, created_at, expires_at)
            VALUES ($1, $2, now(), $3)
            ON CONFLICT (native) DO UPDATE
                SET evm = EXCLUDED.evm, created_at = now(), expires_at = EXCLUDED.expires_at
                WHERE pending_claims.expires_at <= now()
            "#,
        )
        .bind(native)
        .bind(evm)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_claimed(&self, native: &str) -> Result<bool, BridgeError> {
        let row = sqlx::query("SELECT 1 FROM confirmed_claims WHERE native = $1")
            .bind(native)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn has_claim(&self, native: &str, evm: &str) -> Result<bool, BridgeError> {
        let row = sqlx::query("SELECT 1 FROM confirmed_claims WHERE native = $1 AND evm = $2")
            .bind(native)
            .bind(evm)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn confirm_claim(&self, native: &str) -> Result<bool, BridgeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        let pending = sqlx::query("SELECT evm FROM pending_claims WHERE native = $1")
            .bind(native)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        let evm: String = match pending {
            Some(row) => row.get("evm"),
            None => return Ok(false),
        };
        sqlx::query(
            "INSERT INTO confirmed_claims (native, evm, confirmed_at) VALUES ($1, $2, now()) \
             ON CONFLICT (native) DO NOTHING",
        )
        .bind(native)
        .bind(&evm)
        .execute(&mut *tx)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        sqlx::query("DELETE FROM pending_claims WHERE native = $1")
            .bind(native)
            .execute(&mut *tx)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(true)
    }

    async fn has_deposit(&self, native: &str, hash: &str) -> Result<bool, BridgeError> {
        let row = sqlx::query("SELECT 1 FROM deposits WHERE native = $1 AND hash = $2")
            .bind(native)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn store_deposit(
        &self,
        native: &str,
        amount: AtomicUnits,
        ts: i64,
        hash: &str,
    ) -> Result<(), BridgeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        self.acquire_named_lock(&mut tx, &format!("balance:{}", native))
            .await?;

        let inserted = sqlx::query(
            "INSERT INTO deposits (native, amount, ts, hash) VALUES ($1, $2::NUMERIC, $3, $4) \
             ON CONFLICT (native, hash) DO NOTHING",
        )
        .bind(native)
        .bind(amount.to_string())
        .bind(ts)
        .bind(hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;

        if inserted.rows_affected() > 0 {
            sqlx::query(
                r#"
                INSERT INTO balances (native, amount, updated_at) VALUES ($1, $2::NUMERIC, now())
                ON CONFLICT (native) DO UPDATE SET amount = balances.amount + $2::NUMERIC, updated_at = now()
                "#,
            )
            .bind(native)
            .bind(amount.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(())
    }

    async fn has_withdrawal_at(&self, native: &str, ts: i64) -> Result<bool, BridgeError> {
        let row = sqlx::query("SELECT 1 FROM withdrawals WHERE native = $1 AND ts = $2")
            .bind(native)
            .bind(ts)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn store_withdrawal(
        &self,
        native: &str,
        amount: AtomicUnits,
        ts: i64,
        hash: &str,
    ) -> Result<(), BridgeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        self.acquire_named_lock(&mut tx, &format!("balance:{}", native))
            .await?;

        sqlx::query("INSERT INTO withdrawals (native, amount, ts, hash) VALUES ($1, $2::NUMERIC, $3, $4)")
            .bind(native)
            .bind(amount.to_string())
            .bind(ts)
            .bind(hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;

        // Re-check sufficiency here, inside the lock: the caller's balance read happened
        // before the lock was acquired, so a concurrent debit for the same native address
        // may have landed in between.
        let debited = sqlx::query(
            "UPDATE balances SET amount = amount - $2::NUMERIC, updated_at = now() \
             WHERE native = $1 AND amount >= $2::NUMERIC",
        )
        .bind(native)
        .bind(amount.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        if debited.rows_affected() == 0 {
            return Err(BridgeError::InsufficientBalance);
        }

        tx.commit()
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(())
    }

    async fn store_swap_to_wrapped(
        &self,
        native: &str,
        evm: &str,
        amount: AtomicUnits,
        ts: i64,
        receipt: &str,
        uuid: i64,
    ) -> Result<(), BridgeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        self.acquire_named_lock(&mut tx, &format!("swap-to-wrapped:{}", native))
            .await?;

        sqlx::query(
            "INSERT INTO swaps_to_wrapped (native, evm, amount, ts, receipt, uuid) \
             VALUES ($1, $2, $3::NUMERIC, $4, $5, $6)",
        )
        .bind(native)
        .bind(evm)
        .bind(amount.to_string())
        .bind(ts)
        .bind(receipt)
        .bind(uuid)
        .execute(&mut *tx)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;

        // See store_withdrawal: re-check sufficiency inside the lock, since the caller's
        // balance read happened before the lock was acquired.
        let debited = sqlx::query(
            "UPDATE balances SET amount = amount - $2::NUMERIC, updated_at = now() \
             WHERE native = $1 AND amount >= $2::NUMERIC",
        )
        .bind(native)
        .bind(amount.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        if debited.rows_affected() == 0 {
            return Err(BridgeError::InsufficientBalance);
        }

        tx.commit()
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(())
    }

    async fn has_swap_to_native(&self, evm: &str, hash: &str) -> Result<bool, BridgeError> {
        let row = sqlx::query("SELECT 1 FROM swaps_to_native WHERE evm = $1 AND hash = $2")
            .bind(evm)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn store_swap_to_native(&self, swap: &SwapToNativeEvent) -> Result<(), BridgeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        self.acquire_named_lock(&mut tx, &format!("balance:{}", swap.native))
            .await?;

        let inserted = sqlx::query(
            "INSERT INTO swaps_to_native (evm, native, amount, ts, hash) \
             VALUES ($1, $2, $3::NUMERIC, $4, $5) ON CONFLICT (evm, hash) DO NOTHING",
        )
        .bind(&swap.evm)
        .bind(&swap.native)
        .bind(swap.amount.to_string())
        .bind(swap.ts)
        .bind(&swap.hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;

        if inserted.rows_affected() > 0 {
            sqlx::query(
                r#"
                INSERT INTO balances (native, amount, updated_at) VALUES ($1, $2::NUMERIC, now())
                ON CONFLICT (native) DO UPDATE SET amount = balances.amount + $2::NUMERIC, updated_at = now()
                "#,
            )
            .bind(&swap.native)
            .bind(swap.amount.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(())
    }

    async fn get_scan_cursor(&self) -> Result<i64, BridgeError> {
        let row = sqlx::query("SELECT block FROM scan_cursor WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(row.map(|r| r.get::<i64, _>("block")).unwrap_or(0))
    }

    async fn advance_scan_cursor(&self, block: i64) -> Result<(), BridgeError> {
        // The cursor only advances — the WHERE clause makes the write a no-op
        // whenever a concurrent catch-up slice already moved it further.
        sqlx::query(
            r#"
            INSERT INTO scan_cursor (id, block) VALUES (1, $1)
            ON CONFLICT (id) DO UPDATE SET block = $1 WHERE scan_cursor.block < $1
            "#,
        )
        .bind(block)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(())
    }

    async fn history(&self, evm: &str, native: &str) -> Result<History, BridgeError> {
        let deposits = sqlx::query_as::<_, Deposit>(
            "SELECT native, amount::TEXT as amount, ts, hash FROM deposits \
             WHERE native = $1 ORDER BY ts DESC LIMIT $2",
        )
        .bind(native)
        .bind(HISTORY_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;

        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            "SELECT native, amount::TEXT as amount, ts, hash FROM withdrawals \
             WHERE native = $1 ORDER BY ts DESC LIMIT $2",
        )
        .bind(native)
        .bind(HISTORY_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;

        let swaps_to_wrapped = sqlx::query_as::<_, SwapToWrapped>(
            "SELECT native, evm, amount::TEXT as amount, ts, receipt, uuid FROM swaps_to_wrapped \
             WHERE native = $1 ORDER BY ts DESC LIMIT $2",
        )
        .bind(native)
        .bind(HISTORY_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;

        let swaps_to_native = sqlx::query_as::<_, SwapToNative>(
            "SELECT evm, native, amount::TEXT as amount, ts, hash FROM swaps_to_native \
             WHERE evm = $1 ORDER BY ts DESC LIMIT $2",
        )
        .bind(evm)
        .bind(HISTORY_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;

        Ok(History {
            deposits,
            withdrawals,
            swaps_to_wrapped,
            swaps_to_native,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// These tests exercise only the pure parts of the module (no live Postgres
    /// connection); the full CRUD surface is exercised by `tests/integration_test.rs`
    /// when `DATABASE_URL` is set.
    #[test]
    fn test_history_default_is_empty() {
        let history = History::default();
        assert!(history.deposits.is_empty());
        assert!(history.withdrawals.is_empty());
        assert!(history.swaps_to_wrapped.is_empty());
        assert!(history.swaps_to_native.is_empty());
    }
}
