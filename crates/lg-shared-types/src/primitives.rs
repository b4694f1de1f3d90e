//! # Chain Primitives
//!
//! 20-byte addresses and the hex quantity encoding used by JSON-RPC.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors parsing an address string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Missing the `0x` marker.
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),

    /// Wrong number of hex digits.
    #[error("address must have 40 hex digits, got {got}")]
    InvalidLength {
        /// Digits found after the prefix
        got: usize,
    },

    /// Non-hex characters.
    #[error("address is not valid hex: {0}")]
    InvalidHex(String),
}

/// A 20-byte account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Parse `0x` followed by exactly 40 hex digits (any case).
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(trimmed.to_string()))?;
        if digits.len() != 40 {
            return Err(AddressError::InvalidLength { got: digits.len() });
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|_| AddressError::InvalidHex(trimmed.to_string()))?;
        Ok(Self(out))
    }

    /// True if `input` is a syntactically valid address.
    pub fn is_valid(input: &str) -> bool {
        Self::parse(input).is_ok()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse a JSON-RPC hex quantity (`0x1a`) into a `u64`.
pub fn parse_hex_u64(value: &str) -> Result<u64, std::num::ParseIntError> {
    let clean = value.trim().to_ascii_lowercase();
    let digits = clean.strip_prefix("0x").unwrap_or(&clean);
    u64::from_str_radix(digits, 16)
}

/// Encode a `u64` as a JSON-RPC hex quantity.
pub fn to_hex_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}
