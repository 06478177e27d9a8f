//! # Fungible Asset Ledger
//!
//! [`AssetLedger`] is the token interface the vault pulls escrow through and
//! pays it out of. The caller of every mutating method is passed in
//! explicitly: the host decides who is calling, the ledger only checks that
//! the caller is entitled to move the funds.
//!
//! [`Erc20Ledger`] is a fixed-supply token held in memory. The whole supply
//! is minted to the issuer at construction; after that value only moves
//! between accounts.
//!
//! ## Authorization
//!
//! - `transfer` debits the caller.
//! - `transfer_from` debits `from` and consumes `from`'s allowance for the
//!   calling spender. Allowances are set with [`Erc20Ledger::approve`] and
//!   use overwrite semantics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LedgerError;
use crate::address::Address;

/// A fungible token ledger as seen by the vault.
pub trait AssetLedger {
    /// Ticker symbol of the token.
    fn symbol(&self) -> &str;

    /// Decimal places of the smallest unit.
    fn decimals(&self) -> u8;

    /// Total units in existence.
    fn total_supply(&self) -> u128;

    /// Units held by `holder`.
    fn balance_of(&self, holder: &Address) -> u128;

    /// Units `spender` may still move out of `owner`'s balance.
    fn allowance(&self, owner: &Address, spender: &Address) -> u128;

    /// Moves `amount` from `caller` to `to`.
    fn transfer(&mut self, caller: &Address, to: &Address, amount: u128)
        -> Result<(), LedgerError>;

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance.
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError>;
}

/// In-memory fixed-supply token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20Ledger {
    name: String,
    symbol: String,
    decimals: u8,
    total_supply: u128,
    balances: HashMap<Address, u128>,
    /// `owner -> (spender -> remaining allowance)`.
    allowances: HashMap<Address, HashMap<Address, u128>>,
}

impl Erc20Ledger {
    /// Creates a token and mints `initial_supply` to `issuer`.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
        issuer: Address,
        initial_supply: u128,
    ) -> Self {
        let mut balances = HashMap::new();
        if initial_supply > 0 {
            balances.insert(issuer, initial_supply);
        }
        Self {
            name: name.into(),
            symbol: symbol.into().to_uppercase(),
            decimals,
            total_supply: initial_supply,
            balances,
            allowances: HashMap::new(),
        }
    }

    /// Human-readable token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Authorizes `spender` to move up to `amount` of `owner`'s balance.
    ///
    /// Replaces any previous allowance for the pair.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAddress`] if either party is the zero address.
    pub fn approve(
        &mut self,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if owner.is_zero() || spender.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        self.allowances
            .entry(*owner)
            .or_default()
            .insert(*spender, amount);
        debug!(token = %self.symbol, %owner, %spender, amount, "allowance set");
        Ok(())
    }

    fn move_balance(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if from.is_zero() || to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        let balance = self.balance_of(from);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: *from,
                balance,
                requested: amount,
            });
        }

        // Self-transfers leave balances untouched.
        if from == to {
            return Ok(());
        }

        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        self.balances.insert(*from, balance - amount);
        self.balances.insert(*to, credited);

        debug!(token = %self.symbol, %from, %to, amount, "token transfer");
        Ok(())
    }
}

impl AssetLedger for Erc20Ledger {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn total_supply(&self) -> u128 {
        self.total_supply
    }

    fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.move_balance(caller, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let allowance = self.allowance(from, spender);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: *from,
                spender: *spender,
                allowance,
                requested: amount,
            });
        }

        self.move_balance(from, to, amount)?;

        if let Some(spenders) = self.allowances.get_mut(from) {
            spenders.insert(*spender, allowance - amount);
        }
        Ok(())
    }
}
