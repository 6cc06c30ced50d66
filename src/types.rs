#![allow(dead_code)]

use alloy::primitives::U256;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use crate::address_codec::NativeAddress;

/// EVM address (20 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvmAddress(pub [u8; 20]);

impl EvmAddress {
    /// Create from hex string (with or without 0x prefix).
    pub fn from_hex(hex: &str) -> Result<Self, eyre::Error> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex)?;
        if bytes.len() != 20 {
            return Err(eyre!("EvmAddress must be 20 bytes"));
        }
        let mut result = [0u8; 20];
        result.copy_from_slice(&bytes);
        Ok(EvmAddress(result))
    }

    /// Convert to EIP-55 checksummed hex string with 0x prefix.
    pub fn as_hex(&self) -> String {
        let bytes32 = self.as_bytes32();
        let bytes = bytes32.as_slice();
        let hex_lower = hex::encode_upper(bytes);
        let mut result = String::with_capacity(42);
        result.push('0');
        result.push('x');
        for (i, c) in hex_lower.chars().enumerate() {
            let byte = bytes[i];
            let uppercase = if byte & 0x80 != 0 {
                c.to_ascii_uppercase()
            } else {
                c
            };
            result.push(uppercase);
        }
        result
    }

    /// Convert to bytes32 (left-padded with zeros).
    pub fn as_bytes32(&self) -> [u8; 32] {
        let mut result = [0u8; 32];
        result[12..].copy_from_slice(&self.0);
        result
    }

    /// Create from bytes32 (extract last 20 bytes).
    pub fn from_bytes32(bytes: &[u8; 32]) -> Self {
        let mut result = [0u8; 20];
        result.copy_from_slice(&bytes[12..]);
        EvmAddress(result)
    }

    pub fn as_alloy(&self) -> alloy::primitives::Address {
        alloy::primitives::Address::from(self.0)
    }

    pub fn from_alloy(addr: alloy::primitives::Address) -> Self {
        EvmAddress(*addr.0)
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

/// Monetary amount in atomic units (§9 "big integer money"). Never floating point.
///
/// Native coin has 9 decimals, wrapped token 18; both fit comfortably in a `U256`,
/// so one newtype serves both without an additional bigdecimal dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct AtomicUnits(pub U256);

impl AtomicUnits {
    pub const ZERO: AtomicUnits = AtomicUnits(U256::ZERO);

    pub fn from_u64(v: u64) -> Self {
        AtomicUnits(U256::from(v))
    }

    /// Native coin has 9 decimals: parse a decimal string ("1.466") into atomic units.
    /// Returns an error on malformed input; callers distinguish ">2 decimals" separately
    /// via `has_more_than_two_decimals`, since the refund rule in I6 applies only to
    /// native-coin deposits, not to arbitrary parse failures.
    pub fn parse_decimal(s: &str, decimals: u32) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(eyre!("empty amount"));
        }
        let negative = s.starts_with('-');
        let unsigned = s.strip_prefix('-').unwrap_or(s);
        let mut parts = unsigned.splitn(2, '.');
        let whole = parts.next().unwrap_or("0");
        let frac = parts.next().unwrap_or("");
        if frac.len() as u32 > decimals {
            return Err(eyre!("too many decimal places for {} decimals", decimals));
        }
        let whole: U256 = whole.parse().map_err(|_| eyre!("invalid integer part"))?;
        let scale = U256::from(10u64).pow(U256::from(decimals));
        let frac_padded = format!("{:0<width$}", frac, width = decimals as usize);
        let frac_units: U256 = if frac_padded.is_empty() {
            U256::ZERO
        } else {
            frac_padded.parse().map_err(|_| eyre!("invalid fractional part"))?
        };
        let units = whole * scale + frac_units;
        if negative {
            return Err(eyre!("amount must not be negative"));
        }
        Ok(AtomicUnits(units))
    }

    /// I6: native deposits with more than two decimal places are refunded. For 9-decimal
    /// native coin, "more than two decimals" means units not divisible by 10^(9-2) = 10^7.
    pub fn has_more_than_two_decimals(&self, decimals: u32) -> bool {
        if decimals < 2 {
            return false;
        }
        let modulus = U256::from(10u64).pow(U256::from(decimals - 2));
        self.0 % modulus != U256::ZERO
    }

    pub fn to_decimal_string(&self, decimals: u32) -> String {
        let scale = U256::from(10u64).pow(U256::from(decimals));
        let whole = self.0 / scale;
        let frac = self.0 % scale;
        if decimals == 0 {
            return whole.to_string();
        }
        let frac_str = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
        format!("{}.{}", whole, frac_str)
    }

    pub fn checked_sub(&self, other: AtomicUnits) -> Option<AtomicUnits> {
        self.0.checked_sub(other.0).map(AtomicUnits)
    }

    pub fn saturating_add(&self, other: AtomicUnits) -> AtomicUnits {
        AtomicUnits(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for AtomicUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evm_address_from_hex() {
        let addr = EvmAddress::from_hex("0xdead000000000000000000000000000000000000").unwrap();
        assert_eq!(addr.0[0], 0xde);
        assert_eq!(addr.0[1], 0xad);
    }

    #[test]
    fn test_evm_address_from_hex_without_prefix() {
        let addr = EvmAddress::from_hex("dead000000000000000000000000000000000000").unwrap();
        assert_eq!(addr.0[0], 0xde);
    }

    #[test]
    fn test_evm_address_invalid_length() {
        let result = EvmAddress::from_hex("0xdead");
        assert!(result.is_err());
    }

    #[test]
    fn test_evm_address_bytes32_roundtrip() {
        let addr = EvmAddress::from_hex("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
        let bytes32 = addr.as_bytes32();
        let recovered = EvmAddress::from_bytes32(&bytes32);
        assert_eq!(addr, recovered);
    }

    #[test]
    fn test_parse_decimal_whole_native() {
        let amt = AtomicUnits::parse_decimal("1.0", 9).unwrap();
        assert_eq!(amt, AtomicUnits::from_u64(1_000_000_000));
    }

    #[test]
    fn test_parse_decimal_two_places() {
        let amt = AtomicUnits::parse_decimal("1.46", 9).unwrap();
        assert_eq!(amt, AtomicUnits::from_u64(1_460_000_000));
        assert!(!amt.has_more_than_two_decimals(9));
    }

    #[test]
    fn test_more_than_two_decimals_detected() {
        let amt = AtomicUnits::parse_decimal("1.466", 9).unwrap();
        assert!(amt.has_more_than_two_decimals(9));
    }

    #[test]
    fn test_negative_amount_rejected() {
        assert!(AtomicUnits::parse_decimal("-5", 9).is_err());
    }

    #[test]
    fn test_too_many_decimals_rejected_at_precision_limit() {
        assert!(AtomicUnits::parse_decimal("1.0000000001", 9).is_err());
    }

    #[test]
    fn test_to_decimal_string_roundtrip() {
        let amt = AtomicUnits::parse_decimal("4.12", 9).unwrap();
        assert_eq!(amt.to_decimal_string(9), "4.120000000");
    }
}
