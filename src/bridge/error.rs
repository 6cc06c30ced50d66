//! Stable, client-facing error kinds (§7).
//!
//! Kept distinct from `eyre::Report`: HTTP handlers and job processors match on the
//! error *kind* here rather than parsing a message string, the way the rest of this
//! crate's infra errors are plumbed with `eyre::WrapErr`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    #[error("signature does not recover to the claimed owner")]
    InvalidSignature,

    #[error("EVM address is not the owner of the claimed native address")]
    InvalidOwner,

    #[error("address is blacklisted")]
    Blacklisted,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("already processed")]
    AlreadyProcessed,

    #[error("insufficient hot-wallet liquidity, queued for rebalancing")]
    PendingLiquidity,

    #[error("could not acquire named lock after retrying")]
    ContentionTimeout,

    #[error("native deposit has more than two decimal places, refunding")]
    TooManyDecimals,

    #[error("external system failure: {0}")]
    ExternalFailure(String),
}

impl BridgeError {
    /// HTTP status code this error kind maps to (§6/§7).
    pub fn status_code(&self) -> u16 {
        match self {
            BridgeError::InvalidSignature | BridgeError::InvalidOwner => 401,
            BridgeError::Blacklisted => 403,
            BridgeError::InsufficientBalance | BridgeError::TooManyDecimals => 400,
            BridgeError::AlreadyProcessed => 409,
            BridgeError::PendingLiquidity => 202,
            BridgeError::ContentionTimeout => 503,
            BridgeError::ExternalFailure(_) => 502,
        }
    }

    /// Whether a queue worker should retry the job that produced this error, rather
    /// than dead-lettering it immediately (§7.1). Distinguishes typed Bridge Service
    /// failures from the opaque upstream RPC strings `retry::classify_error` handles.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::ContentionTimeout | BridgeError::ExternalFailure(_)
        )
    }

    /// Machine-readable error code for the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::InvalidSignature => "invalid_signature",
            BridgeError::InvalidOwner => "invalid_owner",
            BridgeError::Blacklisted => "blacklisted",
            BridgeError::InsufficientBalance => "insufficient_balance",
            BridgeError::AlreadyProcessed => "already_processed",
            BridgeError::PendingLiquidity => "pending_liquidity",
            BridgeError::ContentionTimeout => "contention_timeout",
            BridgeError::TooManyDecimals => "too_many_decimals",
            BridgeError::ExternalFailure(_) => "external_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(BridgeError::InvalidSignature.status_code(), 401);
        assert_eq!(BridgeError::Blacklisted.status_code(), 403);
        assert_eq!(BridgeError::AlreadyProcessed.status_code(), 409);
        assert_eq!(BridgeError::PendingLiquidity.status_code(), 202);
        assert_eq!(BridgeError::ContentionTimeout.status_code(), 503);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(BridgeError::ContentionTimeout.is_retryable());
        assert!(BridgeError::ExternalFailure("rpc timeout".to_string()).is_retryable());
        assert!(!BridgeError::InvalidSignature.is_retryable());
        assert!(!BridgeError::AlreadyProcessed.is_retryable());
    }

    #[test]
    fn test_codes_are_distinct() {
        let all = [
            BridgeError::InvalidSignature,
            BridgeError::InvalidOwner,
            BridgeError::Blacklisted,
            BridgeError::InsufficientBalance,
            BridgeError::AlreadyProcessed,
            BridgeError::PendingLiquidity,
            BridgeError::ContentionTimeout,
            BridgeError::TooManyDecimals,
        ];
        let codes: Vec<&str> = all.iter().map(|e| e.code()).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
