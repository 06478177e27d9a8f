//! # Native Currency
//!
//! Native value is not a token contract: it is attached to calls and sent to
//! addresses by the execution environment. [`ValueTransfer`] is the narrow
//! slice of that environment the vault uses.
//!
//! A recipient may refuse incoming value (think of a contract without a
//! payable receive hook). [`NativeLedger::reject_incoming`] models that, so a
//! payout to such an account fails and the enclosing vault operation rolls
//! back.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LedgerError;
use crate::address::Address;

/// Native-currency balances plus a fallible send primitive.
pub trait ValueTransfer {
    /// Native units held by `holder`.
    fn balance_of(&self, holder: &Address) -> u128;

    /// Moves `amount` native units from `from` to `to`.
    fn send(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError>;
}

/// In-memory native-currency ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeLedger {
    balances: HashMap<Address, u128>,
    rejecting: HashSet<Address>,
}

impl NativeLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` to `holder` out of thin air (genesis allocation).
    pub fn mint(&mut self, holder: &Address, amount: u128) -> Result<(), LedgerError> {
        if holder.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        let credited = self
            .balance_of(holder)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.balances.insert(*holder, credited);
        Ok(())
    }

    /// Makes every future send to `holder` fail with
    /// [`LedgerError::RecipientRejected`].
    pub fn reject_incoming(&mut self, holder: &Address) {
        self.rejecting.insert(*holder);
    }

    /// Lets `holder` receive value again.
    pub fn accept_incoming(&mut self, holder: &Address) {
        self.rejecting.remove(holder);
    }

    /// Sum of all balances, saturating at `u128::MAX`.
    pub fn total_issued(&self) -> u128 {
        self.balances
            .values()
            .fold(0u128, |total, balance| total.saturating_add(*balance))
    }
}

impl ValueTransfer for NativeLedger {
    fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    fn send(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        if from.is_zero() || to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        if self.rejecting.contains(to) {
            return Err(LedgerError::RecipientRejected { recipient: *to });
        }

        let balance = self.balance_of(from);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: *from,
                balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }

        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        self.balances.insert(*from, balance - amount);
        self.balances.insert(*to, credited);

        debug!(%from, %to, amount, "native transfer");
        Ok(())
    }
}
