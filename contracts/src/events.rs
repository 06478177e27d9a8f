//! Vault events
//!
//! Immutable records of each successful state transition. A vault appends
//! one event per committed operation; failed operations emit nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// The owner locked funds in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultFunded {
    pub vault: Address,
    pub owner: Address,
    pub asset: Address,
    pub amount: u128,
    pub native_value: u128,
    pub unlock_at: DateTime<Utc>,
    pub funded_at: DateTime<Utc>,
}

/// The beneficiary withdrew the vested funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingReleased {
    pub vault: Address,
    pub beneficiary: Address,
    pub asset: Address,
    pub amount: u128,
    pub native_value: u128,
    pub released_at: DateTime<Utc>,
}

/// The owner cancelled vesting and reclaimed whatever was escrowed.
///
/// `asset` is `None` when the vault was blacklisted before it was funded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiaryBlacklisted {
    pub vault: Address,
    pub owner: Address,
    pub beneficiary: Address,
    pub asset: Option<Address>,
    pub reclaimed_amount: u128,
    pub reclaimed_native_value: u128,
    pub blacklisted_at: DateTime<Utc>,
}

/// Enum wrapper for all vault events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultEvent {
    Funded(VaultFunded),
    Released(VestingReleased),
    Blacklisted(BeneficiaryBlacklisted),
}

impl VaultEvent {
    /// Address of the vault that emitted the event.
    pub fn vault(&self) -> Address {
        match self {
            VaultEvent::Funded(e) => e.vault,
            VaultEvent::Released(e) => e.vault,
            VaultEvent::Blacklisted(e) => e.vault,
        }
    }
}
