//! # Vault Configuration & Constants
//!
//! Every limit the vault enforces lives here. Changing one of these after a
//! vault has been funded does not affect that vault: the effective limits are
//! copied into its [`VaultConfig`] at deployment.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Length of an [`Address`](crate::address::Address) in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Prefix of the textual address form.
pub const ADDRESS_PREFIX: &str = "0x";

// ---------------------------------------------------------------------------
// Vesting Limits
// ---------------------------------------------------------------------------

/// Seconds in a (non-leap) year.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Longest lock a vault accepts. A hundred years is well past any real
/// vesting schedule and keeps the unlock instant far away from the edge of
/// what `chrono` can represent.
pub const MAX_VESTING_DURATION_SECS: u64 = 100 * SECONDS_PER_YEAR;

// ---------------------------------------------------------------------------
// Denominations
// ---------------------------------------------------------------------------

/// Decimal places of the native currency (wei-style smallest units).
pub const NATIVE_DECIMALS: u8 = 18;

/// Decimal places assumed for a fungible token when none is given.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Per-vault configuration
// ---------------------------------------------------------------------------

/// Limits captured by a vault when it is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Upper bound (inclusive) on the vesting duration accepted by `fund`.
    pub max_vesting_duration_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            max_vesting_duration_secs: MAX_VESTING_DURATION_SECS,
        }
    }
}
