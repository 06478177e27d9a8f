//! # Vesting Vault
//!
//! A single-beneficiary time-locked escrow. The owner deposits a fixed amount
//! of one fungible asset (plus, optionally, native value); the beneficiary can
//! take all of it once the vesting duration has elapsed. Until then the owner
//! can cancel by blacklisting the beneficiary, which returns everything to
//! the owner.
//!
//! ```text
//! Unfunded --fund(owner)--------------------------> Funded
//! Funded   --withdraw(beneficiary, now >= unlock)--> Withdrawn    (terminal)
//! {Unfunded, Funded} --blacklist(owner)-----------> Blacklisted  (terminal)
//! ```
//!
//! ## Atomicity
//!
//! Each operation runs between a host checkpoint and a commit. If any guard
//! or transfer fails, the host is rolled back to the checkpoint and the vault
//! state is restored, so a failed call has no observable effect.
//!
//! ## Guard order
//!
//! `withdraw` reports, in order: `NotFunded`, `Unauthorized`, `Blacklisted`,
//! `AlreadyWithdrawn`, `NotYetUnlocked`. An unfunded vault therefore answers
//! `NotFunded` to every caller.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::address::Address;
use crate::config::VaultConfig;
use crate::events::{BeneficiaryBlacklisted, VaultEvent, VaultFunded, VestingReleased};
use crate::host::Host;
use crate::ledger::LedgerError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
///
/// Every variant is a distinct, caller-visible reason. A failed operation
/// never changes vault or ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// The caller is not allowed to perform this operation.
    #[error("unauthorized: {caller} may not {operation}, only the {required} can")]
    Unauthorized {
        /// Operation that was attempted.
        operation: Operation,
        /// The identity that attempted it.
        caller: Address,
        /// The role the operation is restricted to.
        required: Role,
    },

    /// The beneficiary given at deployment is unusable.
    #[error("invalid beneficiary: {0}")]
    InvalidBeneficiary(Address),

    /// Vesting duration is zero, above the configured maximum, or pushes the
    /// unlock instant past what the clock can represent.
    #[error("invalid vesting duration: {secs}s")]
    InvalidDuration {
        /// Requested duration in seconds.
        secs: u64,
    },

    /// The asset address does not resolve to a token ledger.
    #[error("invalid asset: {0} is not a token ledger")]
    InvalidAsset(Address),

    /// `withdraw` before `fund`.
    #[error("vault not funded yet")]
    NotFunded,

    /// `fund` on a vault that has already been funded.
    #[error("vault already funded")]
    AlreadyFunded,

    /// The vested funds have already been released.
    #[error("vested tokens already redeemed")]
    AlreadyWithdrawn,

    /// The owner cancelled vesting.
    #[error("owner cancelled vesting")]
    Blacklisted,

    /// The vesting duration has not elapsed.
    #[error("vesting duration not completed: unlocks at {unlock_at}")]
    NotYetUnlocked {
        /// Instant at which withdrawal becomes possible.
        unlock_at: DateTime<Utc>,
    },

    /// The asset ledger refused a transfer.
    #[error("asset transfer failed: {0}")]
    AssetTransferFailed(#[source] LedgerError),

    /// Native value could not be moved.
    #[error("value transfer failed: {0}")]
    ValueTransferFailed(#[source] LedgerError),
}

impl VaultError {
    /// Stable snake_case name of the variant, for reports and scripting.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::Unauthorized { .. } => "unauthorized",
            VaultError::InvalidBeneficiary(_) => "invalid_beneficiary",
            VaultError::InvalidDuration { .. } => "invalid_duration",
            VaultError::InvalidAsset(_) => "invalid_asset",
            VaultError::NotFunded => "not_funded",
            VaultError::AlreadyFunded => "already_funded",
            VaultError::AlreadyWithdrawn => "already_withdrawn",
            VaultError::Blacklisted => "blacklisted",
            VaultError::NotYetUnlocked { .. } => "not_yet_unlocked",
            VaultError::AssetTransferFailed(_) => "asset_transfer_failed",
            VaultError::ValueTransferFailed(_) => "value_transfer_failed",
        }
    }
}

/// Public operations of the vault, used in error reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Fund,
    Withdraw,
    Blacklist,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Fund => write!(f, "fund"),
            Operation::Withdraw => write!(f, "withdraw"),
            Operation::Blacklist => write!(f, "blacklist the beneficiary"),
        }
    }
}

/// The two privileged identities of a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Beneficiary,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Beneficiary => write!(f, "beneficiary"),
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What a funded vault holds and when it unlocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
    /// Token ledger holding the escrowed balance.
    pub asset: Address,
    /// Escrowed token units.
    pub amount: u128,
    /// Escrowed native units (may be zero).
    pub native_value: u128,
    /// Ledger time of funding.
    pub funded_at: DateTime<Utc>,
    /// Earliest ledger time at which the beneficiary may withdraw.
    pub unlock_at: DateTime<Utc>,
}

/// Lifecycle of a vault.
///
/// `Withdrawn` and `Blacklisted` are absorbing: no operation leaves them.
/// They keep the escrow record for history; the vault holds nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultState {
    /// Deployed, nothing deposited yet.
    Unfunded,
    /// Funds locked until `unlock_at`.
    Funded(Escrow),
    /// Funds released to the beneficiary.
    Withdrawn(Escrow),
    /// Vesting cancelled by the owner. `reclaimed` is `None` if the vault
    /// was never funded.
    Blacklisted { reclaimed: Option<Escrow> },
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultState::Unfunded => write!(f, "Unfunded"),
            VaultState::Funded(_) => write!(f, "Funded"),
            VaultState::Withdrawn(_) => write!(f, "Withdrawn"),
            VaultState::Blacklisted { .. } => write!(f, "Blacklisted"),
        }
    }
}

/// Arguments of [`VestingVault::fund`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingTerms {
    /// Lock duration in seconds, counted from the funding instant.
    pub duration_secs: u64,
    /// Token ledger to pull the escrow from.
    pub asset: Address,
    /// Token units to escrow. The owner must have approved the vault for at
    /// least this much.
    pub amount: u128,
    /// Native units attached to the call.
    #[serde(default)]
    pub native_value: u128,
}

impl FundingTerms {
    /// Token-only funding.
    pub fn new(duration_secs: u64, asset: Address, amount: u128) -> Self {
        Self {
            duration_secs,
            asset,
            amount,
            native_value: 0,
        }
    }

    /// Attaches native value to the funding call.
    pub fn with_native_value(mut self, native_value: u128) -> Self {
        self.native_value = native_value;
        self
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// A vesting vault bound to one owner and one beneficiary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VestingVault {
    address: Address,
    owner: Address,
    beneficiary: Address,
    config: VaultConfig,
    state: VaultState,
    events: Vec<VaultEvent>,
}

impl VestingVault {
    /// Deploys a vault at `address`, owned by the deploying `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidBeneficiary`] if `beneficiary` is the
    /// zero address or the vault's own address.
    pub fn deploy(
        address: Address,
        owner: Address,
        beneficiary: Address,
    ) -> Result<Self, VaultError> {
        Self::deploy_with_config(address, owner, beneficiary, VaultConfig::default())
    }

    /// Like [`deploy`](Self::deploy), with explicit limits.
    pub fn deploy_with_config(
        address: Address,
        owner: Address,
        beneficiary: Address,
        config: VaultConfig,
    ) -> Result<Self, VaultError> {
        if beneficiary.is_zero() || beneficiary == address {
            return Err(VaultError::InvalidBeneficiary(beneficiary));
        }

        info!(vault = %address, %owner, %beneficiary, "vesting vault deployed");
        Ok(Self {
            address,
            owner,
            beneficiary,
            config,
            state: VaultState::Unfunded,
            events: Vec::new(),
        })
    }

    // ───────────────────────── Views ─────────────────────────

    /// The vault's own address; it holds the escrowed balances.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn beneficiary(&self) -> Address {
        self.beneficiary
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn state(&self) -> &VaultState {
        &self.state
    }

    /// `true` once `fund` has succeeded. Never reverts to `false`.
    pub fn funded(&self) -> bool {
        match &self.state {
            VaultState::Unfunded => false,
            VaultState::Funded(_) | VaultState::Withdrawn(_) => true,
            VaultState::Blacklisted { reclaimed } => reclaimed.is_some(),
        }
    }

    /// Token units currently escrowed.
    pub fn vesting_vault_value(&self) -> u128 {
        self.escrow().map(|e| e.amount).unwrap_or(0)
    }

    /// Native units currently escrowed.
    pub fn native_value(&self) -> u128 {
        self.escrow().map(|e| e.native_value).unwrap_or(0)
    }

    /// Asset the vault was funded with, if it ever was.
    pub fn asset(&self) -> Option<Address> {
        self.escrow_record().map(|e| e.asset)
    }

    /// Unlock instant, if the vault was ever funded.
    pub fn unlock_at(&self) -> Option<DateTime<Utc>> {
        self.escrow_record().map(|e| e.unlock_at)
    }

    pub fn is_blacklisted(&self) -> bool {
        matches!(self.state, VaultState::Blacklisted { .. })
    }

    pub fn is_withdrawn(&self) -> bool {
        matches!(self.state, VaultState::Withdrawn(_))
    }

    /// Events emitted so far.
    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Takes the event log, leaving it empty.
    pub fn drain_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    /// The live escrow: only while funds are locked.
    fn escrow(&self) -> Option<&Escrow> {
        match &self.state {
            VaultState::Funded(escrow) => Some(escrow),
            _ => None,
        }
    }

    /// The escrow record, live or historical.
    fn escrow_record(&self) -> Option<&Escrow> {
        match &self.state {
            VaultState::Unfunded => None,
            VaultState::Funded(escrow) | VaultState::Withdrawn(escrow) => Some(escrow),
            VaultState::Blacklisted { reclaimed } => reclaimed.as_ref(),
        }
    }

    // ───────────────────────── Operations ─────────────────────────

    /// Locks `terms.amount` of `terms.asset` (and `terms.native_value` native
    /// units) until `now + terms.duration_secs`.
    ///
    /// The token is pulled from the owner with `transfer_from`, so the owner
    /// must first approve the vault's address on the token ledger.
    ///
    /// # Errors
    ///
    /// In order of evaluation: [`VaultError::Unauthorized`] unless `caller`
    /// is the owner; [`VaultError::InvalidDuration`];
    /// [`VaultError::Blacklisted`] or [`VaultError::AlreadyFunded`] unless
    /// the vault is unfunded; [`VaultError::InvalidAsset`];
    /// [`VaultError::AssetTransferFailed`] and
    /// [`VaultError::ValueTransferFailed`] from the ledgers.
    pub fn fund<H>(
        &mut self,
        host: &mut H,
        caller: &Address,
        terms: FundingTerms,
    ) -> Result<VaultEvent, VaultError>
    where
        H: Host + ?Sized,
    {
        self.transact(host, Operation::Fund, |vault, host| {
            vault.require(caller, Role::Owner, Operation::Fund)?;

            let max = vault.config.max_vesting_duration_secs;
            if terms.duration_secs == 0 || terms.duration_secs > max {
                return Err(VaultError::InvalidDuration {
                    secs: terms.duration_secs,
                });
            }

            match vault.state {
                VaultState::Unfunded => {}
                VaultState::Blacklisted { .. } => return Err(VaultError::Blacklisted),
                VaultState::Funded(_) | VaultState::Withdrawn(_) => {
                    return Err(VaultError::AlreadyFunded)
                }
            }

            let now = host.now();
            let unlock_at = unlock_instant(now, terms.duration_secs)?;
            let this = vault.address;

            host.asset_mut(&terms.asset)
                .ok_or(VaultError::InvalidAsset(terms.asset))?
                .transfer_from(&this, caller, &this, terms.amount)
                .map_err(VaultError::AssetTransferFailed)?;

            host.native_mut()
                .send(caller, &this, terms.native_value)
                .map_err(VaultError::ValueTransferFailed)?;

            vault.state = VaultState::Funded(Escrow {
                asset: terms.asset,
                amount: terms.amount,
                native_value: terms.native_value,
                funded_at: now,
                unlock_at,
            });

            info!(
                vault = %this,
                asset = %terms.asset,
                amount = terms.amount,
                native_value = terms.native_value,
                %unlock_at,
                "vault funded"
            );

            Ok(VaultEvent::Funded(VaultFunded {
                vault: this,
                owner: vault.owner,
                asset: terms.asset,
                amount: terms.amount,
                native_value: terms.native_value,
                unlock_at,
                funded_at: now,
            }))
        })
    }

    /// Releases the whole escrow to the beneficiary once unlocked.
    ///
    /// # Errors
    ///
    /// In order of evaluation: [`VaultError::NotFunded`],
    /// [`VaultError::Unauthorized`] unless `caller` is the beneficiary,
    /// [`VaultError::Blacklisted`], [`VaultError::AlreadyWithdrawn`],
    /// [`VaultError::NotYetUnlocked`], then transfer failures.
    pub fn withdraw<H>(&mut self, host: &mut H, caller: &Address) -> Result<VaultEvent, VaultError>
    where
        H: Host + ?Sized,
    {
        self.transact(host, Operation::Withdraw, |vault, host| {
            if !vault.funded() {
                return Err(VaultError::NotFunded);
            }
            vault.require(caller, Role::Beneficiary, Operation::Withdraw)?;

            let escrow = match &vault.state {
                VaultState::Funded(escrow) => escrow.clone(),
                VaultState::Blacklisted { .. } => return Err(VaultError::Blacklisted),
                VaultState::Withdrawn(_) => return Err(VaultError::AlreadyWithdrawn),
                VaultState::Unfunded => return Err(VaultError::NotFunded),
            };

            let now = host.now();
            if now < escrow.unlock_at {
                return Err(VaultError::NotYetUnlocked {
                    unlock_at: escrow.unlock_at,
                });
            }

            let this = vault.address;
            let beneficiary = vault.beneficiary;
            pay_out(host, &this, &beneficiary, &escrow)?;

            info!(
                vault = %this,
                %beneficiary,
                amount = escrow.amount,
                native_value = escrow.native_value,
                "vesting released"
            );

            let event = VaultEvent::Released(VestingReleased {
                vault: this,
                beneficiary,
                asset: escrow.asset,
                amount: escrow.amount,
                native_value: escrow.native_value,
                released_at: now,
            });
            vault.state = VaultState::Withdrawn(escrow);
            Ok(event)
        })
    }

    /// Cancels vesting: returns everything escrowed to the owner and bars
    /// the beneficiary for good. On an unfunded vault nothing moves, but the
    /// vault still becomes blacklisted and can no longer be funded.
    ///
    /// # Errors
    ///
    /// [`VaultError::Unauthorized`] unless `caller` is the owner,
    /// [`VaultError::AlreadyWithdrawn`] after a release,
    /// [`VaultError::Blacklisted`] on a second call, then transfer failures.
    pub fn blacklist_beneficiary<H>(
        &mut self,
        host: &mut H,
        caller: &Address,
    ) -> Result<VaultEvent, VaultError>
    where
        H: Host + ?Sized,
    {
        self.transact(host, Operation::Blacklist, |vault, host| {
            vault.require(caller, Role::Owner, Operation::Blacklist)?;

            let reclaimed = match &vault.state {
                VaultState::Unfunded => None,
                VaultState::Funded(escrow) => Some(escrow.clone()),
                VaultState::Withdrawn(_) => return Err(VaultError::AlreadyWithdrawn),
                VaultState::Blacklisted { .. } => return Err(VaultError::Blacklisted),
            };

            let this = vault.address;
            let owner = vault.owner;
            if let Some(escrow) = &reclaimed {
                pay_out(host, &this, &owner, escrow)?;
            }

            let event = VaultEvent::Blacklisted(BeneficiaryBlacklisted {
                vault: this,
                owner,
                beneficiary: vault.beneficiary,
                asset: reclaimed.as_ref().map(|e| e.asset),
                reclaimed_amount: reclaimed.as_ref().map(|e| e.amount).unwrap_or(0),
                reclaimed_native_value: reclaimed.as_ref().map(|e| e.native_value).unwrap_or(0),
                blacklisted_at: host.now(),
            });

            info!(
                vault = %this,
                beneficiary = %vault.beneficiary,
                reclaimed = reclaimed.is_some(),
                "beneficiary blacklisted"
            );

            vault.state = VaultState::Blacklisted { reclaimed };
            Ok(event)
        })
    }

    // ───────────────────────── Internal ─────────────────────────

    fn require(&self, caller: &Address, role: Role, operation: Operation) -> Result<(), VaultError> {
        let expected = match role {
            Role::Owner => &self.owner,
            Role::Beneficiary => &self.beneficiary,
        };
        if caller != expected {
            return Err(VaultError::Unauthorized {
                operation,
                caller: *caller,
                required: role,
            });
        }
        Ok(())
    }

    /// Runs `op` as one atomic unit against `host`.
    fn transact<H, F>(
        &mut self,
        host: &mut H,
        operation: Operation,
        op: F,
    ) -> Result<VaultEvent, VaultError>
    where
        H: Host + ?Sized,
        F: FnOnce(&mut Self, &mut H) -> Result<VaultEvent, VaultError>,
    {
        let checkpoint = host.checkpoint();
        let prior = self.state.clone();

        match op(self, host) {
            Ok(event) => {
                host.commit(checkpoint);
                self.events.push(event.clone());
                Ok(event)
            }
            Err(err) => {
                host.rollback(checkpoint);
                self.state = prior;
                warn!(vault = %self.address, %operation, error = %err, "operation rejected");
                Err(err)
            }
        }
    }
}

/// `now + secs`, or `InvalidDuration` if that instant is not representable.
fn unlock_instant(now: DateTime<Utc>, secs: u64) -> Result<DateTime<Utc>, VaultError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or(VaultError::InvalidDuration { secs })
}

/// Moves the whole escrow from the vault to `to`.
fn pay_out<H>(host: &mut H, vault: &Address, to: &Address, escrow: &Escrow) -> Result<(), VaultError>
where
    H: Host + ?Sized,
{
    host.asset_mut(&escrow.asset)
        .ok_or(VaultError::InvalidAsset(escrow.asset))?
        .transfer(vault, to, escrow.amount)
        .map_err(VaultError::AssetTransferFailed)?;

    host.native_mut()
        .send(vault, to, escrow.native_value)
        .map_err(VaultError::ValueTransferFailed)
}
