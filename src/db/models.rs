#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Amounts are stored as NUMERIC(38,0) and cast to/from TEXT at the query boundary, so the
// Rust side only ever sees a decimal-integer `String` — avoids a BigDecimal/sqlx version
// entanglement and keeps all monetary math in `AtomicUnits` (a `U256` newtype).

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Balance {
    pub native: String,
    pub amount: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PendingClaim {
    pub native: String,
    pub evm: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ConfirmedClaim {
    pub native: String,
    pub evm: String,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Deposit {
    pub native: String,
    pub amount: String,
    pub ts: i64,
    pub hash: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Withdrawal {
    pub native: String,
    pub amount: String,
    pub ts: i64,
    pub hash: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SwapToWrapped {
    pub native: String,
    pub evm: String,
    pub amount: String,
    pub ts: i64,
    pub receipt: String,
    pub uuid: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SwapToNative {
    pub evm: String,
    pub native: String,
    pub amount: String,
    pub ts: i64,
    pub hash: String,
}

/// A row in the durable job queue backing the Queue component (§4.2).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JobRow {
    pub id: String,
    pub topic: String,
    pub payload: serde_json::Value,
    pub attempt: i32,
    pub max_attempts: i32,
    pub status: String,
    pub run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}
