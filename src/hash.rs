//! Hashing helpers for mint-receipt signing (§4.5 swap-to-wrapped) and hex display.

#![allow(dead_code)]

use alloy::primitives::{keccak256, Address, FixedBytes, U256};

/// Mint-receipt payload: `abi.encode(address evm, uint256 amount, uint256 uuid, uint256 chainId)`,
/// hashed with keccak256. The bridge's EVM key signs the resulting 32-byte digest with
/// `personal_sign` (EIP-191) so the user can present the receipt to the wrapped-token
/// contract and mint exactly `amount`.
pub fn mint_receipt_digest(evm: Address, amount: U256, uuid: u64, chain_id: u64) -> FixedBytes<32> {
    let mut encoded = Vec::with_capacity(32 * 4);
    encoded.extend_from_slice(&[0u8; 12]);
    encoded.extend_from_slice(evm.as_slice());
    encoded.extend_from_slice(&U256::from(amount).to_be_bytes::<32>());
    encoded.extend_from_slice(&U256::from(uuid).to_be_bytes::<32>());
    encoded.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    keccak256(&encoded)
}

pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}
