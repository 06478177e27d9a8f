//! # Vesting Vault Contracts
//!
//! A time-locked vesting vault for one beneficiary, together with the
//! ledger machinery it runs against:
//!
//! - **Vesting Vault** — the owner escrows a fungible asset (and optionally
//!   native value) for a fixed duration; the beneficiary withdraws all of it
//!   once unlocked, unless the owner blacklists them first.
//! - **Ledgers** — an allowance-based token ledger and a native-currency
//!   ledger, both in memory.
//! - **Host** — ledger time, asset resolution and checkpoint/rollback, so
//!   every vault operation is all-or-nothing.
//!
//! ## Design Principles
//!
//! 1. Amounts are `u128` and every credit uses `checked_add`.
//! 2. State transitions are explicit: enum variants, not boolean flags.
//! 3. The caller identity gates every privileged operation.
//! 4. Every public type is serializable (serde) for reports and persistence.

pub mod address;
pub mod clock;
pub mod config;
pub mod events;
pub mod host;
pub mod ledger;
pub mod vesting_vault;

pub use address::{Address, AddressError};
pub use clock::LedgerClock;
pub use config::VaultConfig;
pub use events::VaultEvent;
pub use host::{Checkpoint, Host, InMemoryChain};
pub use ledger::{AssetLedger, Erc20Ledger, LedgerError, NativeLedger, ValueTransfer};
pub use vesting_vault::{
    Escrow, FundingTerms, Operation, Role, VaultError, VaultState, VestingVault,
};
