//! # Addresses
//!
//! Every participant the vault deals with (owner, beneficiary, token ledgers,
//! the vault itself) is identified by a 20-byte [`Address`], written as
//! `0x` followed by 40 lowercase hex digits.
//!
//! Addresses are either parsed from text, derived from a human label (named
//! accounts in tests and scenarios), or derived from a deployer and a nonce
//! when the host creates a new contract:
//!
//! ```text
//! label            -> BLAKE3(label)[..20]
//! deployer, nonce  -> BLAKE3(deployer || nonce_be)[..20]
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ADDRESS_LENGTH, ADDRESS_PREFIX};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while parsing an address string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The string does not start with `0x`.
    #[error("address must start with '0x'")]
    MissingPrefix,

    /// The hex part decodes to the wrong number of bytes.
    #[error("invalid address length: expected {expected} hex digits, got {got}")]
    InvalidLength {
        /// Expected number of hex digits.
        expected: usize,
        /// Number of hex digits found.
        got: usize,
    },

    /// The hex part contains non-hex characters.
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account or contract identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The null identity. Never a valid beneficiary or transfer recipient.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wraps raw bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derives a stable address from a human-readable label.
    ///
    /// The same label always yields the same address, which is what named
    /// accounts (`"owner"`, `"beneficiary"`) rely on.
    pub fn from_label(label: &str) -> Self {
        Self::truncate(blake3::hash(label.as_bytes()).as_bytes())
    }

    /// Derives the address of the `nonce`-th contract created by `deployer`.
    pub fn derive(deployer: &Address, nonce: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&deployer.0);
        hasher.update(&nonce.to_be_bytes());
        Self::truncate(hasher.finalize().as_bytes())
    }

    /// Parses the `0x`-prefixed hex form.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::MissingPrefix`] without the `0x` prefix,
    /// [`AddressError::InvalidLength`] unless exactly 40 hex digits follow,
    /// and [`AddressError::InvalidHex`] for non-hex characters.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let digits = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or(AddressError::MissingPrefix)?;

        if digits.len() != ADDRESS_LENGTH * 2 {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_LENGTH * 2,
                got: digits.len(),
            });
        }

        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Returns `true` for [`Address::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Raw bytes of the address.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    fn truncate(digest: &[u8; 32]) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ADDRESS_PREFIX, hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}
