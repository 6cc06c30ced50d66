//! Codec for native-ledger (`paw_`) addresses.
//!
//! Nano/Banano-family addresses are not bech32 (the wire format the rest of this
//! corpus reaches for by default): a 256-bit ed25519 public key is base32-encoded
//! with a custom alphabet, padded to a whole number of 5-bit groups, and suffixed
//! with a 5-byte blake2b checksum of the public key (byte order reversed) encoded
//! the same way.

#![allow(dead_code)]

use blake2::digest::consts::U5;
use blake2::{Blake2b, Digest};
use eyre::{eyre, Result};

const PREFIX: &str = "paw_";
const ALPHABET: &[u8] = b"13456789abcdefghijkmnopqrstuwxyz";

type Blake2b40 = Blake2b<U5>;

/// A native-ledger address: a 32-byte public key plus its derived checksum, displayed
/// with the `paw_` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeAddress {
    pub pubkey: [u8; 32],
}

impl NativeAddress {
    pub fn from_pubkey(pubkey: [u8; 32]) -> Self {
        NativeAddress { pubkey }
    }

    /// Parse a `paw_...` address string into its public key, validating the checksum.
    pub fn parse(addr: &str) -> Result<Self> {
        let body = addr
            .strip_prefix(PREFIX)
            .ok_or_else(|| eyre!("native address must start with {}", PREFIX))?;
        // 52 chars encode the 256-bit pubkey (padded to 260 bits), 8 chars encode the checksum.
        if body.len() != 60 {
            return Err(eyre!(
                "native address body must be 60 chars, got {}",
                body.len()
            ));
        }
        let (pubkey_part, checksum_part) = body.split_at(52);
        let pubkey = decode_base32_pubkey(pubkey_part)?;
        let expected_checksum = checksum_of(&pubkey);
        let actual_checksum = decode_base32_checksum(checksum_part)?;
        if expected_checksum != actual_checksum {
            return Err(eyre!("native address checksum mismatch"));
        }
        Ok(NativeAddress { pubkey })
    }

    /// Render as a `paw_...` address string.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(4 + 60);
        out.push_str(PREFIX);
        out.push_str(&encode_base32_pubkey(&self.pubkey));
        out.push_str(&encode_base32_checksum(&checksum_of(&self.pubkey)));
        out
    }
}

impl std::fmt::Display for NativeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// blake2b(pubkey) truncated to 5 bytes, then byte-reversed — matches the Nano/Banano
/// convention of reversing the checksum bytes before base32 encoding.
fn checksum_of(pubkey: &[u8; 32]) -> [u8; 5] {
    let mut hasher = Blake2b40::new();
    hasher.update(pubkey);
    let digest = hasher.finalize();
    let mut checksum = [0u8; 5];
    checksum.copy_from_slice(&digest);
    checksum.reverse();
    checksum
}

/// Encode the 256-bit pubkey as 52 base32 chars: prepend 4 zero bits so the 260-bit
/// total is a whole number of 5-bit groups.
fn encode_base32_pubkey(pubkey: &[u8; 32]) -> String {
    let mut bits: Vec<u8> = Vec::with_capacity(260);
    bits.extend(std::iter::repeat(0u8).take(4));
    for byte in pubkey {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1);
        }
    }
    encode_bits(&bits)
}

fn encode_base32_checksum(checksum: &[u8; 5]) -> String {
    let mut bits: Vec<u8> = Vec::with_capacity(40);
    for byte in checksum {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1);
        }
    }
    encode_bits(&bits)
}

fn encode_bits(bits: &[u8]) -> String {
    bits.chunks(5)
        .map(|chunk| {
            let mut value = 0u8;
            for &bit in chunk {
                value = (value << 1) | bit;
            }
            ALPHABET[value as usize] as char
        })
        .collect()
}

fn decode_base32_pubkey(s: &str) -> Result<[u8; 32]> {
    let bits = decode_to_bits(s)?;
    if bits.len() != 260 {
        return Err(eyre!("pubkey segment decodes to wrong bit length"));
    }
    // Drop the 4 leading padding bits.
    Ok(bits_to_bytes(&bits[4..]).try_into().map_err(|_| eyre!("pubkey length mismatch"))?)
}

fn decode_base32_checksum(s: &str) -> Result<[u8; 5]> {
    let bits = decode_to_bits(s)?;
    if bits.len() != 40 {
        return Err(eyre!("checksum segment decodes to wrong bit length"));
    }
    let bytes = bits_to_bytes(&bits);
    let mut out = [0u8; 5];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn decode_to_bits(s: &str) -> Result<Vec<u8>> {
    let mut bits = Vec::with_capacity(s.len() * 5);
    for c in s.chars() {
        let idx = ALPHABET
            .iter()
            .position(|&a| a as char == c)
            .ok_or_else(|| eyre!("invalid base32 character '{}'", c))?;
        for i in (0..5).rev() {
            bits.push(((idx >> i) & 1) as u8);
        }
    }
    Ok(bits)
}

fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            let mut value = 0u8;
            for &bit in chunk {
                value = (value << 1) | bit;
            }
            value
        })
        .collect()
}
